//! Week lifecycle manager
//!
//! Enforces the one-open-week invariant, the 7-day maximum span, the
//! no-overlap rule, and the no-reopen rule. An open week's implicit end is
//! `from_date + 6` for all interval arithmetic.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{OperatingWeek, WEEK_MAX_EXTRA_DAYS};
use crate::services::warehouse::WarehouseService;

const WEEK_COLUMNS: &str = "id, warehouse_id, season_id, from_date, to_date, label, active, \
                            archived_at, archived_by_cascade, created_at";

/// Operating week lifecycle management
#[derive(Clone)]
pub struct WeekService {
    db: PgPool,
}

/// Input for starting a week
#[derive(Debug, Deserialize)]
pub struct StartWeekInput {
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub from_date: NaiveDate,
    pub label: Option<String>,
}

impl WeekService {
    /// Create a new WeekService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Start a new open week. The season row lock taken by the open-season
    /// check serializes concurrent callers, so two of them cannot both
    /// observe "no open week" and both insert, even on a season with no
    /// weeks yet.
    pub async fn start_week(&self, input: StartWeekInput) -> AppResult<OperatingWeek> {
        let mut tx = self.db.begin().await?;

        WarehouseService::require_open_season(&mut tx, input.warehouse_id, input.season_id)
            .await?;

        let existing = sqlx::query_as::<_, OperatingWeek>(&format!(
            "SELECT {WEEK_COLUMNS} FROM operating_weeks \
             WHERE warehouse_id = $1 AND season_id = $2 AND active \
             FOR UPDATE"
        ))
        .bind(input.warehouse_id)
        .bind(input.season_id)
        .fetch_all(&mut *tx)
        .await?;

        if existing.iter().any(|w| w.is_open()) {
            return Err(AppError::conflict(
                "operating_week",
                "An open week already exists for this season",
            ));
        }

        let new_end = input.from_date + Duration::days(WEEK_MAX_EXTRA_DAYS);
        for week in &existing {
            if spans_overlap(
                input.from_date,
                new_end,
                week.from_date,
                week.effective_end(),
            ) {
                return Err(AppError::conflict(
                    "operating_week",
                    format!(
                        "Requested span overlaps the week starting {}",
                        week.from_date
                    ),
                ));
            }
        }

        let label = input
            .label
            .unwrap_or_else(|| iso_week_label(input.from_date));

        let week = sqlx::query_as::<_, OperatingWeek>(&format!(
            "INSERT INTO operating_weeks (warehouse_id, season_id, from_date, label) \
             VALUES ($1, $2, $3, $4) RETURNING {WEEK_COLUMNS}"
        ))
        .bind(input.warehouse_id)
        .bind(input.season_id)
        .bind(input.from_date)
        .bind(&label)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_database)?;

        tx.commit().await?;

        tracing::info!(week_id = %week.id, from_date = %week.from_date, label = %label, "week started");
        Ok(week)
    }

    /// Close an open week. A requested end past `from_date + 6` is clamped,
    /// not rejected. Once closed a week can never be reopened.
    pub async fn close_week(&self, week_id: Uuid, to_date: NaiveDate) -> AppResult<OperatingWeek> {
        let mut tx = self.db.begin().await?;

        let week = sqlx::query_as::<_, OperatingWeek>(&format!(
            "SELECT {WEEK_COLUMNS} FROM operating_weeks WHERE id = $1 FOR UPDATE"
        ))
        .bind(week_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Operating week".to_string()))?;

        if !week.is_open() {
            return Err(AppError::InvalidStateTransition(
                "Week is already closed and cannot be reopened".to_string(),
            ));
        }

        if to_date < week.from_date {
            return Err(AppError::validation(
                "to_date",
                "End date cannot precede the week's start date",
            ));
        }

        let effective = clamp_close_date(week.from_date, to_date);
        if effective != to_date {
            tracing::warn!(
                week_id = %week_id,
                requested = %to_date,
                clamped = %effective,
                "close date clamped to the 7-day maximum span"
            );
        }

        let week = sqlx::query_as::<_, OperatingWeek>(&format!(
            "UPDATE operating_weeks SET to_date = $1 WHERE id = $2 RETURNING {WEEK_COLUMNS}"
        ))
        .bind(effective)
        .bind(week_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(week_id = %week.id, to_date = %effective, "week closed");
        Ok(week)
    }

    /// The currently open week for a season, if any. Pure read.
    pub async fn get_active_week(
        &self,
        warehouse_id: Uuid,
        season_id: Uuid,
    ) -> AppResult<Option<OperatingWeek>> {
        let week = sqlx::query_as::<_, OperatingWeek>(&format!(
            "SELECT {WEEK_COLUMNS} FROM operating_weeks \
             WHERE warehouse_id = $1 AND season_id = $2 AND to_date IS NULL AND active"
        ))
        .bind(warehouse_id)
        .bind(season_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(week)
    }

    /// Get a week by ID
    pub async fn get_week(&self, week_id: Uuid) -> AppResult<OperatingWeek> {
        sqlx::query_as::<_, OperatingWeek>(&format!(
            "SELECT {WEEK_COLUMNS} FROM operating_weeks WHERE id = $1"
        ))
        .bind(week_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Operating week".to_string()))
    }

    /// List weeks of a season in date order
    pub async fn list_weeks(
        &self,
        warehouse_id: Uuid,
        season_id: Uuid,
    ) -> AppResult<Vec<OperatingWeek>> {
        let weeks = sqlx::query_as::<_, OperatingWeek>(&format!(
            "SELECT {WEEK_COLUMNS} FROM operating_weeks \
             WHERE warehouse_id = $1 AND season_id = $2 AND active \
             ORDER BY from_date"
        ))
        .bind(warehouse_id)
        .bind(season_id)
        .fetch_all(&self.db)
        .await?;

        Ok(weeks)
    }
}

/// Clamp a requested close date to at most `from_date + 6`.
pub fn clamp_close_date(from_date: NaiveDate, to_date: NaiveDate) -> NaiveDate {
    let max = from_date + Duration::days(WEEK_MAX_EXTRA_DAYS);
    to_date.min(max)
}

/// Inclusive interval overlap on dates.
pub fn spans_overlap(
    a_from: NaiveDate,
    a_to: NaiveDate,
    b_from: NaiveDate,
    b_to: NaiveDate,
) -> bool {
    a_from <= b_to && b_from <= a_to
}

/// Informational ISO-week label, e.g. "2026-W35".
pub fn iso_week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}
