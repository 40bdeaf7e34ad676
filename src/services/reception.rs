//! Reception and classification ledger
//!
//! Receptions record raw intake; classification lines record its packed
//! breakdown. Both are validated against the operating week resolved for
//! their date, and a reception can never be classified past its received
//! quantity. Once any consumption references a line, the reception and all
//! of its lines freeze.

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidationCollector};
use crate::models::{
    normalize_quality, quality_valid_for, ClassificationLine, Material, OperatingWeek, Quality,
    Reception,
};
use crate::services::warehouse::WarehouseService;

const RECEPTION_COLUMNS: &str = "id, warehouse_id, season_id, week_id, reception_date, quantity, \
                                 origin, active, archived_at, archived_by_cascade, created_at";
const LINE_COLUMNS: &str = "id, reception_id, warehouse_id, season_id, week_id, reception_date, \
                            material, quality, variety, quantity, active, archived_at, \
                            archived_by_cascade, created_at";

/// Reception and classification management
#[derive(Clone)]
pub struct ReceptionService {
    db: PgPool,
}

/// Input for recording a reception
#[derive(Debug, Deserialize)]
pub struct RecordReceptionInput {
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub reception_date: NaiveDate,
    pub quantity: i32,
    pub origin: Option<String>,
}

/// Input for recording a classification line
#[derive(Debug, Deserialize)]
pub struct RecordClassificationInput {
    pub reception_id: Uuid,
    pub material: Material,
    pub quality: Quality,
    pub variety: String,
    pub quantity: i32,
    /// When supplied, must equal the reception's week.
    pub week_id: Option<Uuid>,
}

impl ReceptionService {
    /// Create a new ReceptionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record raw intake. The date must resolve to an open week of the
    /// season; a closed week is a conflict, no week at all is a hard error.
    pub async fn record_reception(&self, input: RecordReceptionInput) -> AppResult<Reception> {
        if input.quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Quantity must be positive",
            ));
        }

        let mut tx = self.db.begin().await?;

        WarehouseService::require_open_season(&mut tx, input.warehouse_id, input.season_id)
            .await?;

        let week =
            resolve_week_for_date(&mut tx, input.warehouse_id, input.season_id, input.reception_date)
                .await?
                .ok_or_else(|| AppError::NotFound("Operating week for date".to_string()))?;

        if !week.is_open() {
            return Err(AppError::conflict(
                "operating_week",
                "The week covering this date is already closed",
            ));
        }
        if !week.contains(input.reception_date) {
            return Err(AppError::validation(
                "reception_date",
                "Date falls outside the operating week's span",
            ));
        }

        let reception = sqlx::query_as::<_, Reception>(&format!(
            "INSERT INTO receptions (warehouse_id, season_id, week_id, reception_date, quantity, origin) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RECEPTION_COLUMNS}"
        ))
        .bind(input.warehouse_id)
        .bind(input.season_id)
        .bind(week.id)
        .bind(input.reception_date)
        .bind(input.quantity)
        .bind(&input.origin)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            reception_id = %reception.id,
            quantity = reception.quantity,
            "reception recorded"
        );
        Ok(reception)
    }

    /// Record one packed-output line for a reception. Sub-checks are
    /// aggregated: the caller gets every failing field, not just the first.
    /// The reception row is locked so two concurrent classifications cannot
    /// both pass the overpicking check.
    pub async fn record_classification(
        &self,
        input: RecordClassificationInput,
    ) -> AppResult<ClassificationLine> {
        let mut tx = self.db.begin().await?;

        let reception = sqlx::query_as::<_, Reception>(&format!(
            "SELECT {RECEPTION_COLUMNS} FROM receptions WHERE id = $1 FOR UPDATE"
        ))
        .bind(input.reception_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reception".to_string()))?;

        if !reception.active {
            return Err(AppError::conflict("reception", "Reception is archived"));
        }

        WarehouseService::require_open_season(&mut tx, reception.warehouse_id, reception.season_id)
            .await?;

        let mut checks = ValidationCollector::new();

        if input.quantity <= 0 {
            checks.push("quantity", "Quantity must be positive");
        }

        let quality = normalize_quality(input.material, input.quality);
        if !quality_valid_for(input.material, quality) {
            checks.push(
                "quality",
                format!(
                    "Quality '{}' is not valid for material '{}'",
                    quality.as_str(),
                    input.material.as_str()
                ),
            );
        }

        if input.variety.trim().is_empty() {
            checks.push("variety", "Variety is required");
        }

        // Consistency guard: a caller-supplied week must be the reception's.
        if let Some(week_id) = input.week_id {
            if week_id != reception.week_id {
                checks.push("week_id", "Week does not match the reception's week");
            }
        }

        checks.finish()?;

        let week = sqlx::query_as::<_, OperatingWeek>(
            "SELECT id, warehouse_id, season_id, from_date, to_date, label, active, \
             archived_at, archived_by_cascade, created_at \
             FROM operating_weeks WHERE id = $1",
        )
        .bind(reception.week_id)
        .fetch_one(&mut *tx)
        .await?;

        if !week.is_open() {
            return Err(AppError::conflict(
                "operating_week",
                "The reception's week is already closed",
            ));
        }
        if !week.contains(reception.reception_date) {
            return Err(AppError::validation(
                "reception_date",
                "Date falls outside the operating week's span",
            ));
        }

        if Self::reception_locked(&mut tx, reception.id).await? {
            return Err(AppError::conflict(
                "reception",
                "Reception has consumed stock and is read-only",
            ));
        }

        let already_classified = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM classification_lines \
             WHERE reception_id = $1 AND active",
        )
        .bind(reception.id)
        .fetch_one(&mut *tx)
        .await?;

        if exceeds_received(reception.quantity, already_classified, input.quantity) {
            return Err(AppError::conflict(
                "classification",
                format!(
                    "Classified total would reach {} of {} received boxes",
                    already_classified + i64::from(input.quantity),
                    reception.quantity
                ),
            ));
        }

        let line = sqlx::query_as::<_, ClassificationLine>(&format!(
            "INSERT INTO classification_lines \
             (reception_id, warehouse_id, season_id, week_id, reception_date, material, quality, variety, quantity) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {LINE_COLUMNS}"
        ))
        .bind(reception.id)
        .bind(reception.warehouse_id)
        .bind(reception.season_id)
        .bind(reception.week_id)
        .bind(reception.reception_date)
        .bind(input.material)
        .bind(quality)
        .bind(input.variety.trim())
        .bind(input.quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(line_id = %line.id, quantity = line.quantity, "classification recorded");
        Ok(line)
    }

    /// Change a line's quantity. Rejected once the reception is locked or
    /// the new total would exceed the received quantity.
    pub async fn update_classification_quantity(
        &self,
        line_id: Uuid,
        quantity: i32,
    ) -> AppResult<ClassificationLine> {
        if quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Quantity must be positive",
            ));
        }

        let mut tx = self.db.begin().await?;

        let line = sqlx::query_as::<_, ClassificationLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM classification_lines WHERE id = $1 FOR UPDATE"
        ))
        .bind(line_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Classification line".to_string()))?;

        let reception = sqlx::query_as::<_, Reception>(&format!(
            "SELECT {RECEPTION_COLUMNS} FROM receptions WHERE id = $1 FOR UPDATE"
        ))
        .bind(line.reception_id)
        .fetch_one(&mut *tx)
        .await?;

        if Self::reception_locked(&mut tx, reception.id).await? {
            return Err(AppError::conflict(
                "reception",
                "Reception has consumed stock and is read-only",
            ));
        }

        let other_lines = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM classification_lines \
             WHERE reception_id = $1 AND active AND id <> $2",
        )
        .bind(reception.id)
        .bind(line.id)
        .fetch_one(&mut *tx)
        .await?;

        if exceeds_received(reception.quantity, other_lines, quantity) {
            return Err(AppError::conflict(
                "classification",
                format!(
                    "Classified total would reach {} of {} received boxes",
                    other_lines + i64::from(quantity),
                    reception.quantity
                ),
            ));
        }

        let line = sqlx::query_as::<_, ClassificationLine>(&format!(
            "UPDATE classification_lines SET quantity = $1 WHERE id = $2 RETURNING {LINE_COLUMNS}"
        ))
        .bind(quantity)
        .bind(line.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(line)
    }

    /// Soft-delete a classification line. Rejected once locked.
    pub async fn archive_classification_line(&self, line_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let line = sqlx::query_as::<_, ClassificationLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM classification_lines WHERE id = $1 FOR UPDATE"
        ))
        .bind(line_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Classification line".to_string()))?;

        if !line.active {
            return Ok(());
        }

        if Self::reception_locked(&mut tx, line.reception_id).await? {
            return Err(AppError::conflict(
                "reception",
                "Reception has consumed stock and is read-only",
            ));
        }

        sqlx::query(
            "UPDATE classification_lines \
             SET active = FALSE, archived_at = NOW(), archived_by_cascade = FALSE \
             WHERE id = $1",
        )
        .bind(line_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Get a reception by ID
    pub async fn get_reception(&self, reception_id: Uuid) -> AppResult<Reception> {
        sqlx::query_as::<_, Reception>(&format!(
            "SELECT {RECEPTION_COLUMNS} FROM receptions WHERE id = $1"
        ))
        .bind(reception_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reception".to_string()))
    }

    /// List a reception's active classification lines
    pub async fn list_classification_lines(
        &self,
        reception_id: Uuid,
    ) -> AppResult<Vec<ClassificationLine>> {
        let lines = sqlx::query_as::<_, ClassificationLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM classification_lines \
             WHERE reception_id = $1 AND active ORDER BY created_at"
        ))
        .bind(reception_id)
        .fetch_all(&self.db)
        .await?;

        Ok(lines)
    }

    /// Whether the reception is frozen by existing consumption.
    pub async fn is_reception_locked(&self, reception_id: Uuid) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;
        let locked = Self::reception_locked(&mut tx, reception_id).await?;
        tx.commit().await?;
        Ok(locked)
    }

    /// Two independent signals lock a reception: any active order
    /// consumption on one of its lines, or any active truck-load consumption
    /// whose truck is confirmed and active.
    async fn reception_locked(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        reception_id: Uuid,
    ) -> AppResult<bool> {
        let order_locked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS( \
                SELECT 1 FROM order_consumptions oc \
                JOIN classification_lines cl ON cl.id = oc.classification_line_id \
                WHERE cl.reception_id = $1 AND oc.active)",
        )
        .bind(reception_id)
        .fetch_one(&mut **tx)
        .await?;

        if order_locked {
            return Ok(true);
        }

        let truck_locked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS( \
                SELECT 1 FROM truck_consumptions tc \
                JOIN classification_lines cl ON cl.id = tc.classification_line_id \
                JOIN trucks t ON t.id = tc.truck_id \
                WHERE cl.reception_id = $1 AND tc.active \
                  AND t.state = 'confirmed' AND t.active)",
        )
        .bind(reception_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(truck_locked)
    }
}

/// Resolve the candidate week for a date: the latest week of (warehouse,
/// season) starting on or before it. Callers still validate that the date
/// falls inside the week's effective span.
pub(crate) async fn resolve_week_for_date(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    warehouse_id: Uuid,
    season_id: Uuid,
    date: NaiveDate,
) -> AppResult<Option<OperatingWeek>> {
    let week = sqlx::query_as::<_, OperatingWeek>(
        "SELECT id, warehouse_id, season_id, from_date, to_date, label, active, \
         archived_at, archived_by_cascade, created_at \
         FROM operating_weeks \
         WHERE warehouse_id = $1 AND season_id = $2 AND active \
           AND from_date <= $3 \
         ORDER BY from_date DESC \
         LIMIT 1",
    )
    .bind(warehouse_id)
    .bind(season_id)
    .bind(date)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(week)
}

/// Overpicking check: would adding `requested` push the reception's
/// classified total past its received quantity?
pub fn exceeds_received(received: i32, already_classified: i64, requested: i32) -> bool {
    already_classified + i64::from(requested) > i64::from(received)
}
