//! Operating-period ledger and stock allocation core for orchard packing
//! warehouses.
//!
//! This crate is the domain layer behind a multi-tenant packhouse backend:
//! the weekly operating-period state machine, the produced/consumed stock
//! ledger for packed inventory, FEFO multi-line allocation for truck
//! loading, correlative document numbering, and cascading archive/restore
//! across the entity tree. Request handling, reporting formats, and
//! authorization live in the consumers; every operation here assumes an
//! already-authorized caller and runs as one database transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult, FieldError};
