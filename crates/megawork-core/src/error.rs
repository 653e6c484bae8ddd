//! Core error types for megawork-core.
//!
//! Library-facing errors are `thiserror` enums grouped by concern. The
//! umbrella [`CoreError`] converts from each of them so callers can use `?`
//! across storage, configuration and timer setup in one function.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for megawork-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected cycle timer parameters
    #[error("Timer configuration error: {0}")]
    Timer(#[from] TimerConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Invalid parameters passed to [`crate::CycleTimer::new`].
///
/// Each variant names the parameter at fault so a session that cannot start
/// tells the user what to fix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerConfigError {
    #[error("work duration must be positive (got {0})")]
    NonPositiveWork(chrono::TimeDelta),

    #[error("rest duration must be positive (got {0})")]
    NonPositiveRest(chrono::TimeDelta),

    #[error("number of cycles must be positive (got {0})")]
    NonPositiveCycles(i64),

    #[error("a cycle of {work} work and {rest} rest is too long to track")]
    CycleTooLong {
        work: chrono::TimeDelta,
        rest: chrono::TimeDelta,
    },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key not present in the configuration
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// The data directory could not be located or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required form field was left blank
    #[error("'{0}' is required")]
    Required(&'static str),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
