#![forbid(unsafe_code)]

//! Shared error type and transport value model.

pub mod value;

use thiserror::Error;

use crate::db::config::ConfigError;

pub use value::{FromValue, PrimitiveKind, Value, ValueKind};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors surfaced by layouts, builders, runners and the bundled drivers.
#[derive(Debug, Error)]
pub enum DbError {
    /// Declared row or result shape cannot be satisfied.
    #[error("layout error: {0}")]
    Layout(String),
    /// A scalar could not be coerced to the declared target type.
    #[error("type mismatch: expected {expected}, found {found}{detail}")]
    TypeMismatch {
        /// Declared target kind.
        expected: ValueKind,
        /// Runtime kind of the raw value.
        found: &'static str,
        /// Optional trailing context, already prefixed with a separator.
        detail: String,
    },
    /// The driver boundary produced a portion that contradicts the declared layout.
    #[error("portion shape violation: expected {expected}, got {found}")]
    PortionShape {
        /// Shape the layout asked for.
        expected: &'static str,
        /// Shape that actually arrived.
        found: &'static str,
    },
    /// Error reported by a driver boundary implementation.
    #[error("driver error: {0}")]
    Driver(String),
    /// Error reported by SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Parameters could not be bound to the statement.
    #[error("parameter error: {0}")]
    Parameter(String),
    /// The owning session has been closed.
    #[error("session is closed")]
    SessionClosed,
    /// The runner has been closed.
    #[error("runner is closed")]
    RunnerClosed,
    /// Invalid argument supplied by the caller.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    pub(crate) fn layout(message: impl Into<String>) -> Self {
        DbError::Layout(message.into())
    }

    pub(crate) fn mismatch(expected: ValueKind, found: &Value) -> Self {
        DbError::TypeMismatch {
            expected,
            found: found.kind_name(),
            detail: String::new(),
        }
    }

    pub(crate) fn mismatch_with(
        expected: ValueKind,
        found: &Value,
        detail: impl std::fmt::Display,
    ) -> Self {
        DbError::TypeMismatch {
            expected,
            found: found.kind_name(),
            detail: format!(": {detail}"),
        }
    }

    /// Returns true for configuration errors that no retry can fix.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DbError::Layout(_) | DbError::Config(_))
    }
}
