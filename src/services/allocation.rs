//! FEFO allocation engine
//!
//! Satisfies one demanded (material, quality, variety, quantity) by greedily
//! consuming classification lines in (date, id) order. Candidate rows are
//! locked before availability is read, the whole pass is one transaction,
//! and a shortfall rolls everything back.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Material, Quality, TruckConsumption};
use crate::services::consumption::{available_from, require_draft_truck};

const TRUCK_CONSUMPTION_COLUMNS: &str = "id, truck_id, classification_line_id, quantity, \
                                         active, archived_at, archived_by_cascade, created_at";

/// Multi-line stock allocation for truck loading
#[derive(Clone)]
pub struct AllocationService {
    db: PgPool,
}

/// Input for an allocation run
#[derive(Debug, Deserialize)]
pub struct AllocateInput {
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub truck_id: Uuid,
    pub material: Material,
    pub quality: Quality,
    pub variety: String,
    pub quantity: i32,
    /// Restrict candidates to one operating week.
    pub week_id: Option<Uuid>,
}

/// A candidate line with its live availability, in visit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub line_id: Uuid,
    pub available: i64,
}

/// One planned take against a candidate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Take {
    pub line_id: Uuid,
    pub quantity: i64,
}

impl AllocationService {
    /// Create a new AllocationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Allocate stock onto a truck. The only operation permitted to create
    /// more than one ledger entry per call; all entries share one
    /// transaction and either all commit or none do.
    pub async fn allocate(&self, input: AllocateInput) -> AppResult<Vec<TruckConsumption>> {
        if input.quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Quantity must be positive",
            ));
        }
        if input.quality == Quality::Waste {
            return Err(AppError::validation(
                "quality",
                "Waste stock cannot be allocated",
            ));
        }

        let mut tx = self.db.begin().await?;

        require_draft_truck(&mut tx, input.truck_id).await?;

        // Lock candidates in visit order, then compute availability inside
        // the lock. Consistent (date, id) ordering keeps concurrent
        // allocators from deadlocking against each other.
        let rows = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT id, quantity FROM classification_lines \
             WHERE warehouse_id = $1 AND season_id = $2 AND active \
               AND material = $3 AND quality = $4 AND variety = $5 \
               AND ($6::uuid IS NULL OR week_id = $6) \
             ORDER BY reception_date ASC, id ASC \
             FOR UPDATE",
        )
        .bind(input.warehouse_id)
        .bind(input.season_id)
        .bind(input.material)
        .bind(input.quality)
        .bind(input.variety.trim())
        .bind(input.week_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for (line_id, quantity) in rows {
            let sums = sqlx::query_as::<_, (i64, i64)>(
                "SELECT \
                    COALESCE((SELECT SUM(quantity) FROM order_consumptions \
                              WHERE classification_line_id = $1 AND active), 0), \
                    COALESCE((SELECT SUM(quantity) FROM truck_consumptions \
                              WHERE classification_line_id = $1 AND active), 0)",
            )
            .bind(line_id)
            .fetch_one(&mut *tx)
            .await?;

            candidates.push(Candidate {
                line_id,
                available: available_from(quantity, sums.0, sums.1),
            });
        }

        let takes = match plan_allocation(&candidates, i64::from(input.quantity)) {
            Ok(takes) => takes,
            Err(short) => {
                // Transaction dropped here rolls everything back.
                return Err(AppError::InsufficientStock(format!(
                    "Demand of {} left {} unsatisfied across {} candidate lines",
                    input.quantity,
                    short,
                    candidates.len()
                )));
            }
        };

        let mut created = Vec::with_capacity(takes.len());
        for take in &takes {
            let consumption = sqlx::query_as::<_, TruckConsumption>(&format!(
                "INSERT INTO truck_consumptions (truck_id, classification_line_id, quantity) \
                 VALUES ($1, $2, $3) RETURNING {TRUCK_CONSUMPTION_COLUMNS}"
            ))
            .bind(input.truck_id)
            .bind(take.line_id)
            .bind(take.quantity as i32)
            .fetch_one(&mut *tx)
            .await?;

            created.push(consumption);
        }

        tx.commit().await?;

        tracing::info!(
            truck_id = %input.truck_id,
            quantity = input.quantity,
            lines = created.len(),
            "allocation committed"
        );
        Ok(created)
    }
}

/// Greedy FEFO plan over candidates already in (date, id) order: take
/// `min(remaining, available)` per line until the demand is satisfied.
/// Returns the unsatisfied remainder when stock runs out. Deterministic for
/// a fixed candidate list.
pub fn plan_allocation(candidates: &[Candidate], demand: i64) -> Result<Vec<Take>, i64> {
    let mut remaining = demand;
    let mut takes = Vec::new();

    for candidate in candidates {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(candidate.available);
        if take > 0 {
            takes.push(Take {
                line_id: candidate.line_id,
                quantity: take,
            });
            remaining -= take;
        }
    }

    if remaining > 0 {
        Err(remaining)
    } else {
        Ok(takes)
    }
}
