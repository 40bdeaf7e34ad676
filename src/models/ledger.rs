//! Ledger rows: receptions, classification lines, and consumption records

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::material::{Material, Quality};

/// Raw intake of field boxes, before packing
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reception {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub week_id: Uuid,
    pub reception_date: NaiveDate,
    pub quantity: i32,
    pub origin: Option<String>,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}

/// Packed-output line derived from a reception. Week, season, and date are
/// denormalized from the parent and must always match it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClassificationLine {
    pub id: Uuid,
    pub reception_id: Uuid,
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub week_id: Uuid,
    pub reception_date: NaiveDate,
    pub material: Material,
    pub quality: Quality,
    pub variety: String,
    pub quantity: i32,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}

/// One demanded (material, quality, variety, quantity) of an order
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub material: Material,
    pub quality: Quality,
    pub variety: String,
    pub quantity: i32,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}

/// Withdrawal against a classification line to fulfill an order line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderConsumption {
    pub id: Uuid,
    pub order_line_id: Uuid,
    pub classification_line_id: Uuid,
    pub quantity: i32,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}

/// Withdrawal against a classification line loaded onto a truck
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TruckConsumption {
    pub id: Uuid,
    pub truck_id: Uuid,
    pub classification_line_id: Uuid,
    pub quantity: i32,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}
