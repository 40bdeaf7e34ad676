//! Truck (shipment) rows and state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Truck lifecycle state. DRAFT accepts mutations, CONFIRMED is frozen,
/// VOID is a soft terminal reachable from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "truck_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TruckState {
    Draft,
    Confirmed,
    Void,
}

impl TruckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TruckState::Draft => "draft",
            TruckState::Confirmed => "confirmed",
            TruckState::Void => "void",
        }
    }
}

/// Outbound shipment. `number` and `folio` stay NULL until confirmation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Truck {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub season_id: Uuid,
    pub week_id: Option<Uuid>,
    pub state: TruckState,
    pub number: Option<i32>,
    pub folio: Option<String>,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Informational manifest row; moves no stock.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TruckManifestItem {
    pub id: Uuid,
    pub truck_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by_cascade: bool,
    pub created_at: DateTime<Utc>,
}
