//! Domain model types for the packhouse operations core

pub mod ledger;
pub mod material;
pub mod period;
pub mod truck;

pub use ledger::{ClassificationLine, OrderConsumption, OrderLine, Reception, TruckConsumption};
pub use material::{normalize_quality, quality_valid_for, Material, Quality};
pub use period::{OperatingWeek, Season, Warehouse, WEEK_MAX_EXTRA_DAYS};
pub use truck::{Truck, TruckManifestItem, TruckState};
