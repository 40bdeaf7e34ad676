//! Truck confirmation protocol
//!
//! Confirmation assigns a correlative number per (warehouse, season) under a
//! row lock on the already-numbered trucks, derives the folio from the weeks
//! the loads actually consumed, and freezes the truck. Everything happens in
//! one transaction: a truck is never left numbered without a folio.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Truck, TruckManifestItem, TruckState};
use crate::services::consumption::require_draft_truck;

const TRUCK_COLUMNS: &str = "id, warehouse_id, season_id, week_id, state, number, folio, active, \
                             archived_at, archived_by_cascade, created_at, confirmed_at";
const MANIFEST_COLUMNS: &str = "id, truck_id, description, quantity, active, archived_at, \
                                archived_by_cascade, created_at";

/// Truck lifecycle and manifest management
#[derive(Clone)]
pub struct TruckService {
    db: PgPool,
}

/// Input for creating a draft truck
#[derive(Debug, Deserialize)]
pub struct CreateTruckInput {
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub week_id: Option<Uuid>,
}

/// Input for a manifest item
#[derive(Debug, Deserialize)]
pub struct AddManifestItemInput {
    pub truck_id: Uuid,
    pub description: String,
    pub quantity: i32,
}

impl TruckService {
    /// Create a new TruckService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a truck in DRAFT state
    pub async fn create_truck(&self, input: CreateTruckInput) -> AppResult<Truck> {
        let truck = sqlx::query_as::<_, Truck>(&format!(
            "INSERT INTO trucks (warehouse_id, season_id, week_id) \
             VALUES ($1, $2, $3) RETURNING {TRUCK_COLUMNS}"
        ))
        .bind(input.warehouse_id)
        .bind(input.season_id)
        .bind(input.week_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(truck_id = %truck.id, "draft truck created");
        Ok(truck)
    }

    /// Get a truck by ID
    pub async fn get_truck(&self, truck_id: Uuid) -> AppResult<Truck> {
        sqlx::query_as::<_, Truck>(&format!("SELECT {TRUCK_COLUMNS} FROM trucks WHERE id = $1"))
            .bind(truck_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Truck".to_string()))
    }

    /// List active trucks of a season, confirmed ones by number
    pub async fn list_trucks(&self, warehouse_id: Uuid, season_id: Uuid) -> AppResult<Vec<Truck>> {
        let trucks = sqlx::query_as::<_, Truck>(&format!(
            "SELECT {TRUCK_COLUMNS} FROM trucks \
             WHERE warehouse_id = $1 AND season_id = $2 AND active \
             ORDER BY number NULLS LAST, created_at"
        ))
        .bind(warehouse_id)
        .bind(season_id)
        .fetch_all(&self.db)
        .await?;

        Ok(trucks)
    }

    /// Add an informational manifest row. DRAFT only.
    pub async fn add_manifest_item(
        &self,
        input: AddManifestItemInput,
    ) -> AppResult<TruckManifestItem> {
        if input.quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Quantity must be positive",
            ));
        }
        if input.description.trim().is_empty() {
            return Err(AppError::validation(
                "description",
                "Description is required",
            ));
        }

        let mut tx = self.db.begin().await?;

        require_draft_truck(&mut tx, input.truck_id).await?;

        let item = sqlx::query_as::<_, TruckManifestItem>(&format!(
            "INSERT INTO truck_manifest_items (truck_id, description, quantity) \
             VALUES ($1, $2, $3) RETURNING {MANIFEST_COLUMNS}"
        ))
        .bind(input.truck_id)
        .bind(input.description.trim())
        .bind(input.quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Soft-delete a manifest row. DRAFT only.
    pub async fn archive_manifest_item(&self, item_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let truck_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT truck_id FROM truck_manifest_items WHERE id = $1",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Manifest item".to_string()))?;

        require_draft_truck(&mut tx, truck_id).await?;

        sqlx::query(
            "UPDATE truck_manifest_items \
             SET active = FALSE, archived_at = NOW(), archived_by_cascade = FALSE \
             WHERE id = $1 AND active",
        )
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// List a truck's active manifest items
    pub async fn list_manifest_items(&self, truck_id: Uuid) -> AppResult<Vec<TruckManifestItem>> {
        let items = sqlx::query_as::<_, TruckManifestItem>(&format!(
            "SELECT {MANIFEST_COLUMNS} FROM truck_manifest_items \
             WHERE truck_id = $1 AND active ORDER BY created_at"
        ))
        .bind(truck_id)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Confirm a truck: assign the next correlative number under a lock on
    /// the season's numbered trucks, derive the folio from the weeks its
    /// loads consumed, freeze it. Idempotent on an already-confirmed truck.
    pub async fn confirm(&self, truck_id: Uuid) -> AppResult<Truck> {
        let mut tx = self.db.begin().await?;

        let truck = sqlx::query_as::<_, Truck>(&format!(
            "SELECT {TRUCK_COLUMNS} FROM trucks WHERE id = $1 FOR UPDATE"
        ))
        .bind(truck_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Truck".to_string()))?;

        if truck.state == TruckState::Void {
            return Err(AppError::InvalidStateTransition(
                "A voided truck cannot be confirmed".to_string(),
            ));
        }
        if truck.state == TruckState::Confirmed && truck.number.is_some() {
            return Ok(truck);
        }

        // The season row lock serializes numbering; the numbered set alone
        // locks nothing while the season has no confirmed trucks yet.
        sqlx::query("SELECT id FROM seasons WHERE id = $1 FOR UPDATE")
            .bind(truck.season_id)
            .execute(&mut *tx)
            .await?;

        let existing_numbers = sqlx::query_scalar::<_, i32>(
            "SELECT number FROM trucks \
             WHERE warehouse_id = $1 AND season_id = $2 AND number IS NOT NULL \
             FOR UPDATE",
        )
        .bind(truck.warehouse_id)
        .bind(truck.season_id)
        .fetch_all(&mut *tx)
        .await?;

        let number = next_correlative(&existing_numbers);

        let load_weeks = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT cl.week_id FROM truck_consumptions tc \
             JOIN classification_lines cl ON cl.id = tc.classification_line_id \
             WHERE tc.truck_id = $1 AND tc.active",
        )
        .bind(truck_id)
        .fetch_all(&mut *tx)
        .await?;

        let folio_week = resolve_folio_week(&load_weeks, truck.week_id)?;
        let folio = build_folio(truck.warehouse_id, truck.season_id, folio_week, number);

        let truck = sqlx::query_as::<_, Truck>(&format!(
            "UPDATE trucks \
             SET state = 'confirmed', number = $1, folio = $2, confirmed_at = NOW() \
             WHERE id = $3 RETURNING {TRUCK_COLUMNS}"
        ))
        .bind(number)
        .bind(&folio)
        .bind(truck_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_database)?;

        tx.commit().await?;

        tracing::info!(truck_id = %truck.id, number, folio = %folio, "truck confirmed");
        Ok(truck)
    }

    /// Void a truck from either state. Releases its loads by archiving them
    /// as a cascade, so availability returns to the lines.
    pub async fn void_truck(&self, truck_id: Uuid) -> AppResult<Truck> {
        let mut tx = self.db.begin().await?;

        let truck = sqlx::query_as::<_, Truck>(&format!(
            "SELECT {TRUCK_COLUMNS} FROM trucks WHERE id = $1 FOR UPDATE"
        ))
        .bind(truck_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Truck".to_string()))?;

        if truck.state == TruckState::Void {
            return Ok(truck);
        }

        sqlx::query(
            "UPDATE truck_consumptions \
             SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
             WHERE truck_id = $1 AND active",
        )
        .bind(truck_id)
        .execute(&mut *tx)
        .await?;

        let truck = sqlx::query_as::<_, Truck>(&format!(
            "UPDATE trucks SET state = 'void' WHERE id = $1 RETURNING {TRUCK_COLUMNS}"
        ))
        .bind(truck_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(truck_id = %truck.id, "truck voided");
        Ok(truck)
    }
}

/// Next correlative number: one past the committed maximum, starting at 1.
/// Failed confirmations never advance it since only committed rows count.
pub fn next_correlative(existing: &[i32]) -> i32 {
    existing.iter().copied().max().unwrap_or(0) + 1
}

/// Resolve the week stamped on the folio from the distinct weeks of the
/// truck's active loads. More than one week is a conflict; none falls back
/// to the truck's own week (or the sentinel in the folio).
pub fn resolve_folio_week(load_weeks: &[Uuid], truck_week: Option<Uuid>) -> AppResult<Option<Uuid>> {
    match load_weeks {
        [] => Ok(truck_week),
        [single] => Ok(Some(*single)),
        _ => Err(AppError::conflict(
            "truck",
            "Loads span multiple operating weeks",
        )),
    }
}

/// Fixed-format folio: short warehouse, season, and week identifiers plus
/// the zero-padded correlative number. A missing week renders as "0".
pub fn build_folio(
    warehouse_id: Uuid,
    season_id: Uuid,
    week_id: Option<Uuid>,
    number: i32,
) -> String {
    let week = week_id.map_or_else(|| "0".to_string(), short_id);
    format!(
        "A{}-T{}-S{}-{:04}",
        short_id(warehouse_id),
        short_id(season_id),
        week,
        number
    )
}

/// First eight hex digits of a UUID, the human-readable short form used in
/// folios.
fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
