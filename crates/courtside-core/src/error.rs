//! Core error types for courtside-core.
//!
//! Invalid control transitions are not errors (they are ignored); this
//! hierarchy covers the store, configuration and caller-supplied selections.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for courtside-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Session store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open session store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Session store is locked")]
    Locked,

    /// The store has been shut down or its lock was poisoned
    #[error("Session store is closed")]
    Closed,

    /// A stored document could not be decoded
    #[error("Malformed session record '{id}': {message}")]
    Malformed { id: String, message: String },
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_wraps_into_core_error() {
        let err: CoreError = StoreError::Locked.into();
        assert_eq!(err.to_string(), "Store error: Session store is locked");
    }

    #[test]
    fn rusqlite_no_rows_becomes_query_failed() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }

    #[test]
    fn validation_message_names_field() {
        let err = ValidationError::InvalidValue {
            field: "rounds".into(),
            message: "must be at least 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for 'rounds': must be at least 1"
        );
    }

    #[test]
    fn validation_error_wraps_into_core_error() {
        let err: CoreError = ValidationError::EmptyCollection("stations".into()).into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: Empty collection: stations");
    }
}
