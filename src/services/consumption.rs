//! Consumption ledger and availability
//!
//! Availability is produced minus all active consumptions, from both
//! origins. Whenever it gates a write, the target classification line is
//! locked first and both sums are recomputed inside that lock, so two
//! concurrent writers never both observe stale availability.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{OrderConsumption, OrderLine, TruckConsumption, TruckState};

const ORDER_LINE_COLUMNS: &str = "id, order_id, material, quality, variety, quantity, active, \
                                  archived_at, archived_by_cascade, created_at";
const ORDER_CONSUMPTION_COLUMNS: &str = "id, order_line_id, classification_line_id, quantity, \
                                         active, archived_at, archived_by_cascade, created_at";
const TRUCK_CONSUMPTION_COLUMNS: &str = "id, truck_id, classification_line_id, quantity, \
                                         active, archived_at, archived_by_cascade, created_at";

/// Consumption recording and availability queries
#[derive(Clone)]
pub struct ConsumptionService {
    db: PgPool,
}

/// A classification line's produced quantity and active consumption sums.
#[derive(Debug, Clone, Copy)]
pub struct LineUsage {
    pub quantity: i32,
    pub order_consumed: i64,
    pub truck_consumed: i64,
}

impl LineUsage {
    pub fn available(&self) -> i64 {
        available_from(self.quantity, self.order_consumed, self.truck_consumed)
    }
}

impl ConsumptionService {
    /// Create a new ConsumptionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Current availability of a classification line. Read-only snapshot;
    /// writers use the locked variant internally.
    pub async fn available(&self, classification_line_id: Uuid) -> AppResult<i64> {
        let mut tx = self.db.begin().await?;
        let usage = lock_line_usage(&mut tx, classification_line_id).await?;
        tx.commit().await?;
        Ok(usage.available())
    }

    /// Consume stock to fulfill an order line. Bounded by both the line's
    /// availability and the order line's own remaining quantity.
    pub async fn fulfill_order_line(
        &self,
        order_line_id: Uuid,
        classification_line_id: Uuid,
        quantity: i32,
    ) -> AppResult<OrderConsumption> {
        if quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Quantity must be positive",
            ));
        }

        let mut tx = self.db.begin().await?;

        let order_line = sqlx::query_as::<_, OrderLine>(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_line_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order line".to_string()))?;

        if !order_line.active {
            return Err(AppError::conflict("order_line", "Order line is archived"));
        }

        let fulfilled = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM order_consumptions \
             WHERE order_line_id = $1 AND active",
        )
        .bind(order_line_id)
        .fetch_one(&mut *tx)
        .await?;

        let remaining = i64::from(order_line.quantity) - fulfilled;
        if i64::from(quantity) > remaining {
            return Err(AppError::conflict(
                "order_line",
                format!("Requested {} exceeds remaining {} on the order line", quantity, remaining),
            ));
        }

        let usage = lock_line_usage(&mut tx, classification_line_id).await?;
        if i64::from(quantity) > usage.available() {
            return Err(AppError::InsufficientStock(format!(
                "Requested {} but only {} available",
                quantity,
                usage.available()
            )));
        }

        let consumption = sqlx::query_as::<_, OrderConsumption>(&format!(
            "INSERT INTO order_consumptions (order_line_id, classification_line_id, quantity) \
             VALUES ($1, $2, $3) RETURNING {ORDER_CONSUMPTION_COLUMNS}"
        ))
        .bind(order_line_id)
        .bind(classification_line_id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            consumption_id = %consumption.id,
            quantity,
            "order fulfillment recorded"
        );
        Ok(consumption)
    }

    /// Load stock onto a DRAFT truck from one classification line.
    pub async fn load_truck(
        &self,
        truck_id: Uuid,
        classification_line_id: Uuid,
        quantity: i32,
    ) -> AppResult<TruckConsumption> {
        if quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Quantity must be positive",
            ));
        }

        let mut tx = self.db.begin().await?;

        require_draft_truck(&mut tx, truck_id).await?;

        let usage = lock_line_usage(&mut tx, classification_line_id).await?;
        if i64::from(quantity) > usage.available() {
            return Err(AppError::InsufficientStock(format!(
                "Requested {} but only {} available",
                quantity,
                usage.available()
            )));
        }

        let consumption = sqlx::query_as::<_, TruckConsumption>(&format!(
            "INSERT INTO truck_consumptions (truck_id, classification_line_id, quantity) \
             VALUES ($1, $2, $3) RETURNING {TRUCK_CONSUMPTION_COLUMNS}"
        ))
        .bind(truck_id)
        .bind(classification_line_id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(consumption_id = %consumption.id, quantity, "truck load recorded");
        Ok(consumption)
    }

    /// Soft-delete an order consumption. Capacity returns implicitly since
    /// only active rows are summed; the line lock prevents a double release
    /// racing a concurrent consumer.
    pub async fn archive_order_consumption(&self, consumption_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let line_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT classification_line_id FROM order_consumptions WHERE id = $1",
        )
        .bind(consumption_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order consumption".to_string()))?;

        lock_line_usage(&mut tx, line_id).await?;

        sqlx::query(
            "UPDATE order_consumptions \
             SET active = FALSE, archived_at = NOW(), archived_by_cascade = FALSE \
             WHERE id = $1 AND active",
        )
        .bind(consumption_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Soft-delete a truck load. Rejected while the truck is confirmed;
    /// voiding the truck is the only way to release a confirmed load.
    pub async fn archive_truck_consumption(&self, consumption_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT truck_id, classification_line_id FROM truck_consumptions WHERE id = $1",
        )
        .bind(consumption_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Truck consumption".to_string()))?;

        require_draft_truck(&mut tx, row.0).await?;
        lock_line_usage(&mut tx, row.1).await?;

        sqlx::query(
            "UPDATE truck_consumptions \
             SET active = FALSE, archived_at = NOW(), archived_by_cascade = FALSE \
             WHERE id = $1 AND active",
        )
        .bind(consumption_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// List active loads of a truck
    pub async fn list_truck_consumptions(&self, truck_id: Uuid) -> AppResult<Vec<TruckConsumption>> {
        let loads = sqlx::query_as::<_, TruckConsumption>(&format!(
            "SELECT {TRUCK_CONSUMPTION_COLUMNS} FROM truck_consumptions \
             WHERE truck_id = $1 AND active ORDER BY created_at"
        ))
        .bind(truck_id)
        .fetch_all(&self.db)
        .await?;

        Ok(loads)
    }
}

/// Lock a classification line and recompute both consumption sums inside
/// the lock. Single acquisition point for everything that gates on
/// availability, so the two origins can never double-count in a race.
pub(crate) async fn lock_line_usage(
    tx: &mut Transaction<'_, Postgres>,
    classification_line_id: Uuid,
) -> AppResult<LineUsage> {
    let line = sqlx::query_as::<_, (i32, bool)>(
        "SELECT quantity, active FROM classification_lines WHERE id = $1 FOR UPDATE",
    )
    .bind(classification_line_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Classification line".to_string()))?;

    if !line.1 {
        return Err(AppError::conflict(
            "classification_line",
            "Classification line is archived",
        ));
    }

    let sums = sqlx::query_as::<_, (i64, i64)>(
        "SELECT \
            COALESCE((SELECT SUM(quantity) FROM order_consumptions \
                      WHERE classification_line_id = $1 AND active), 0), \
            COALESCE((SELECT SUM(quantity) FROM truck_consumptions \
                      WHERE classification_line_id = $1 AND active), 0)",
    )
    .bind(classification_line_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(LineUsage {
        quantity: line.0,
        order_consumed: sums.0,
        truck_consumed: sums.1,
    })
}

/// Lock a truck row and require it to be in DRAFT state.
pub(crate) async fn require_draft_truck(
    tx: &mut Transaction<'_, Postgres>,
    truck_id: Uuid,
) -> AppResult<()> {
    let state = sqlx::query_scalar::<_, TruckState>(
        "SELECT state FROM trucks WHERE id = $1 AND active FOR UPDATE",
    )
    .bind(truck_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Truck".to_string()))?;

    match state {
        TruckState::Draft => Ok(()),
        TruckState::Confirmed => Err(AppError::conflict(
            "truck",
            "Truck is confirmed and its loads are frozen",
        )),
        TruckState::Void => Err(AppError::conflict("truck", "Truck is voided")),
    }
}

/// Availability arithmetic: produced minus all active consumptions, floored
/// at zero.
pub fn available_from(quantity: i32, order_consumed: i64, truck_consumed: i64) -> i64 {
    (i64::from(quantity) - order_consumed - truck_consumed).max(0)
}
