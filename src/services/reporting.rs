//! Read-only aggregation queries over the ledgers
//!
//! Consumed by the reporting layer; owns no formatting.

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Material, Quality};

/// Ledger aggregation service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Classified totals for one (material, quality) bucket
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClassifiedTotal {
    pub material: Material,
    pub quality: Quality,
    pub total_quantity: i64,
}

/// Totals for one operating week
#[derive(Debug, Clone, Serialize)]
pub struct WeekSummary {
    pub week_id: Uuid,
    pub received_boxes: i64,
    pub classified: Vec<ClassifiedTotal>,
    pub consumed_by_orders: i64,
    pub consumed_by_trucks: i64,
}

/// Per-week row of a season rollup
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SeasonWeekRow {
    pub week_id: Uuid,
    pub received_boxes: i64,
    pub classified_boxes: i64,
}

impl ReportingService {
    /// Create a new ReportingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Aggregate one week's intake, packing, and consumption.
    pub async fn week_summary(
        &self,
        warehouse_id: Uuid,
        season_id: Uuid,
        week_id: Uuid,
    ) -> AppResult<WeekSummary> {
        let received_boxes = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM receptions \
             WHERE warehouse_id = $1 AND season_id = $2 AND week_id = $3 AND active",
        )
        .bind(warehouse_id)
        .bind(season_id)
        .bind(week_id)
        .fetch_one(&self.db)
        .await?;

        let classified = sqlx::query_as::<_, ClassifiedTotal>(
            "SELECT material, quality, COALESCE(SUM(quantity), 0) AS total_quantity \
             FROM classification_lines \
             WHERE warehouse_id = $1 AND season_id = $2 AND week_id = $3 AND active \
             GROUP BY material, quality \
             ORDER BY material, quality",
        )
        .bind(warehouse_id)
        .bind(season_id)
        .bind(week_id)
        .fetch_all(&self.db)
        .await?;

        let consumed = sqlx::query_as::<_, (i64, i64)>(
            "SELECT \
                COALESCE((SELECT SUM(oc.quantity) FROM order_consumptions oc \
                          JOIN classification_lines cl ON cl.id = oc.classification_line_id \
                          WHERE cl.week_id = $1 AND oc.active AND cl.active), 0), \
                COALESCE((SELECT SUM(tc.quantity) FROM truck_consumptions tc \
                          JOIN classification_lines cl ON cl.id = tc.classification_line_id \
                          WHERE cl.week_id = $1 AND tc.active AND cl.active), 0)",
        )
        .bind(week_id)
        .fetch_one(&self.db)
        .await?;

        Ok(WeekSummary {
            week_id,
            received_boxes,
            classified,
            consumed_by_orders: consumed.0,
            consumed_by_trucks: consumed.1,
        })
    }

    /// Per-week rollup of a season, in week order.
    pub async fn season_summary(
        &self,
        warehouse_id: Uuid,
        season_id: Uuid,
    ) -> AppResult<Vec<SeasonWeekRow>> {
        let rows = sqlx::query_as::<_, SeasonWeekRow>(
            "SELECT w.id AS week_id, \
                COALESCE((SELECT SUM(r.quantity) FROM receptions r \
                          WHERE r.week_id = w.id AND r.active), 0) AS received_boxes, \
                COALESCE((SELECT SUM(cl.quantity) FROM classification_lines cl \
                          WHERE cl.week_id = w.id AND cl.active), 0) AS classified_boxes \
             FROM operating_weeks w \
             WHERE w.warehouse_id = $1 AND w.season_id = $2 AND w.active \
             ORDER BY w.from_date",
        )
        .bind(warehouse_id)
        .bind(season_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
