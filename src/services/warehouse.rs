//! Period store service: warehouses and their year-scoped seasons

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Season, Warehouse};

const WAREHOUSE_COLUMNS: &str = "id, name, active, archived_at, archived_by_cascade, created_at";
const SEASON_COLUMNS: &str = "id, warehouse_id, year, start_date, end_date, finalized, active, \
                              archived_at, archived_by_cascade, created_at";

/// Warehouse and season management
#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

/// Input for creating a season
#[derive(Debug, Deserialize)]
pub struct CreateSeasonInput {
    pub warehouse_id: Uuid,
    pub year: i32,
    pub start_date: NaiveDate,
}

impl WarehouseService {
    /// Create a new WarehouseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a warehouse with a unique name
    pub async fn create_warehouse(&self, name: &str) -> AppResult<Warehouse> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "Warehouse name is required"));
        }

        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(AppError::conflict(
                "warehouse",
                format!("A warehouse named '{}' already exists", name),
            ));
        }

        let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
            "INSERT INTO warehouses (name) VALUES ($1) RETURNING {WAREHOUSE_COLUMNS}"
        ))
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(warehouse_id = %warehouse.id, name, "warehouse created");
        Ok(warehouse)
    }

    /// Get a warehouse by ID
    pub async fn get_warehouse(&self, warehouse_id: Uuid) -> AppResult<Warehouse> {
        sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1"
        ))
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))
    }

    /// List all active warehouses
    pub async fn list_warehouses(&self) -> AppResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE active ORDER BY name"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(warehouses)
    }

    /// Create a season. At most one non-finalized season may exist per
    /// (warehouse, year); the check runs under a row lock on that set, with
    /// a partial unique index as storage backstop.
    pub async fn create_season(&self, input: CreateSeasonInput) -> AppResult<Season> {
        let mut tx = self.db.begin().await?;

        let warehouse = sqlx::query_as::<_, Warehouse>(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1 FOR UPDATE"
        ))
        .bind(input.warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        if !warehouse.active {
            return Err(AppError::conflict("warehouse", "Warehouse is archived"));
        }

        let open_exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM seasons \
             WHERE warehouse_id = $1 AND year = $2 AND NOT finalized \
             FOR UPDATE",
        )
        .bind(input.warehouse_id)
        .bind(input.year)
        .fetch_optional(&mut *tx)
        .await?;

        if open_exists.is_some() {
            return Err(AppError::conflict(
                "season",
                format!(
                    "A non-finalized season already exists for year {}",
                    input.year
                ),
            ));
        }

        let season = sqlx::query_as::<_, Season>(&format!(
            "INSERT INTO seasons (warehouse_id, year, start_date) \
             VALUES ($1, $2, $3) RETURNING {SEASON_COLUMNS}"
        ))
        .bind(input.warehouse_id)
        .bind(input.year)
        .bind(input.start_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_database)?;

        tx.commit().await?;

        tracing::info!(season_id = %season.id, year = season.year, "season created");
        Ok(season)
    }

    /// Get a season by ID
    pub async fn get_season(&self, season_id: Uuid) -> AppResult<Season> {
        sqlx::query_as::<_, Season>(&format!(
            "SELECT {SEASON_COLUMNS} FROM seasons WHERE id = $1"
        ))
        .bind(season_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Season".to_string()))
    }

    /// List seasons of a warehouse, newest year first
    pub async fn list_seasons(&self, warehouse_id: Uuid) -> AppResult<Vec<Season>> {
        let seasons = sqlx::query_as::<_, Season>(&format!(
            "SELECT {SEASON_COLUMNS} FROM seasons \
             WHERE warehouse_id = $1 AND active ORDER BY year DESC"
        ))
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(seasons)
    }

    /// Finalize a season, stamping its end date. One-way.
    pub async fn finalize_season(&self, season_id: Uuid, end_date: NaiveDate) -> AppResult<Season> {
        let mut tx = self.db.begin().await?;

        let season = sqlx::query_as::<_, Season>(&format!(
            "SELECT {SEASON_COLUMNS} FROM seasons WHERE id = $1 FOR UPDATE"
        ))
        .bind(season_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Season".to_string()))?;

        if season.finalized {
            return Err(AppError::InvalidStateTransition(
                "Season is already finalized".to_string(),
            ));
        }

        if end_date < season.start_date {
            return Err(AppError::validation(
                "end_date",
                "End date cannot precede the season start date",
            ));
        }

        let season = sqlx::query_as::<_, Season>(&format!(
            "UPDATE seasons SET finalized = TRUE, end_date = $1 \
             WHERE id = $2 RETURNING {SEASON_COLUMNS}"
        ))
        .bind(end_date)
        .bind(season_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(season_id = %season.id, %end_date, "season finalized");
        Ok(season)
    }

    /// Shared precondition for ledger writes: season exists, is active, is
    /// not finalized, belongs to the given warehouse, and the warehouse
    /// itself is active. Locks the season row, which serializes every
    /// writer of the season, including writers whose own guard queries
    /// match zero rows and so would lock nothing themselves.
    pub(crate) async fn require_open_season(
        tx: &mut Transaction<'_, Postgres>,
        warehouse_id: Uuid,
        season_id: Uuid,
    ) -> AppResult<Season> {
        let season = sqlx::query_as::<_, Season>(&format!(
            "SELECT {SEASON_COLUMNS} FROM seasons WHERE id = $1 FOR UPDATE"
        ))
        .bind(season_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Season".to_string()))?;

        let warehouse_active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM warehouses WHERE id = $1",
        )
        .bind(season.warehouse_id)
        .fetch_one(&mut **tx)
        .await?;

        season_open_for_writes(&season, warehouse_id, warehouse_active)?;
        Ok(season)
    }
}

/// Pure state checks behind [`WarehouseService::require_open_season`]: the
/// season must belong to the warehouse, both must be active, and the season
/// must not be finalized.
pub fn season_open_for_writes(
    season: &Season,
    warehouse_id: Uuid,
    warehouse_active: bool,
) -> AppResult<()> {
    if season.warehouse_id != warehouse_id {
        return Err(AppError::validation(
            "season_id",
            "Season does not belong to the given warehouse",
        ));
    }
    if !warehouse_active {
        return Err(AppError::conflict("warehouse", "Warehouse is archived"));
    }
    if !season.active {
        return Err(AppError::conflict("season", "Season is archived"));
    }
    if season.finalized {
        return Err(AppError::conflict("season", "Season is finalized"));
    }
    Ok(())
}
