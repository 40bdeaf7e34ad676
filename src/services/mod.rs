//! Business logic services for the packhouse operations core

pub mod allocation;
pub mod archive;
pub mod consumption;
pub mod reception;
pub mod reporting;
pub mod truck;
pub mod warehouse;
pub mod week;

pub use allocation::AllocationService;
pub use archive::ArchiveService;
pub use consumption::ConsumptionService;
pub use reception::ReceptionService;
pub use reporting::ReportingService;
pub use truck::TruckService;
pub use warehouse::WarehouseService;
pub use week::WeekService;
