//! Error handling for the packhouse operations core
//!
//! The split between `Validation` and `Conflict` matters to callers:
//! validation failures are fixed by correcting input, conflicts depend on
//! concurrent state and may succeed on retry.

use serde::Serialize;
use thiserror::Error;

/// A single failed check on a named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Input is malformed or semantically invalid. Carries every failing
    /// field found by the operation, not just the first.
    #[error("validation failed: {}", format_field_errors(.errors))]
    Validation { errors: Vec<FieldError> },

    /// An invariant that depends on concurrent state was violated.
    #[error("conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Single-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation { .. })
    }

    /// Convert a database error, translating unique violations on the
    /// invariant-backstop indexes into the conflicts they enforce. A race
    /// that slips past the row locks still surfaces as the domain conflict,
    /// never as a raw driver error.
    pub fn from_database(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                if let Some(conflict) = db.constraint().and_then(conflict_for_constraint) {
                    return conflict;
                }
            }
        }
        AppError::DatabaseError(err)
    }
}

/// The domain conflict enforced by each invariant-backstop unique index.
pub fn conflict_for_constraint(constraint: &str) -> Option<AppError> {
    match constraint {
        "weeks_one_open_per_season" => Some(AppError::conflict(
            "operating_week",
            "An open week already exists for this season",
        )),
        "seasons_one_open_per_year" => Some(AppError::conflict(
            "season",
            "A non-finalized season already exists for this warehouse and year",
        )),
        "trucks_number_per_season" => Some(AppError::conflict(
            "truck",
            "Truck number was assigned by a concurrent confirmation",
        )),
        _ => None,
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects field errors across the sub-checks of one operation and turns
/// them into a single [`AppError::Validation`] at the end.
#[derive(Debug, Default)]
pub struct ValidationCollector {
    errors: Vec<FieldError>,
}

impl ValidationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ok when no check failed, otherwise one aggregated validation error.
    pub fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation {
                errors: self.errors,
            })
        }
    }
}

/// Result type alias for core operations
pub type AppResult<T> = Result<T, AppError>;
