//! Period store rows: warehouses, seasons, and operating weeks

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Number of days an operating week may span beyond its start date.
pub const WEEK_MAX_EXTRA_DAYS: i64 = 6;

/// Top-level tenant/location entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}

/// One year-scoped operating cycle for a warehouse
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Season {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub finalized: bool,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}

/// A manually bounded sub-period of a season. `to_date = NULL` means OPEN.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OperatingWeek {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: Option<NaiveDate>,
    pub label: Option<String>,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}

impl OperatingWeek {
    pub fn is_open(&self) -> bool {
        self.to_date.is_none()
    }

    /// Effective end for interval checks: the real end once closed, the
    /// implicit `from_date + 6` while open.
    pub fn effective_end(&self) -> NaiveDate {
        self.to_date
            .unwrap_or(self.from_date + Duration::days(WEEK_MAX_EXTRA_DAYS))
    }

    /// Whether a date falls inside the week's (effective) span.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from_date && date <= self.effective_end()
    }
}
