//! Core error types for worktally-core.
//!
//! Nothing in the tracking engine is fatal. Invalid state transitions are
//! reported as `None` by the command that was ignored, and collaborator
//! failures (entry log, state store) ride alongside a completed transition
//! in an [`Outcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for worktally-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The external entry log rejected or could not serve a request
    #[error("Entry log error: {0}")]
    EntryLog(#[from] EntryLogError),

    /// The durable key-value store could not load or save tracker state
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded
    #[error("Malformed row in '{table}': {message}")]
    MalformedRow { table: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Entry log failures. Always soft: tracking continues without the log.
#[derive(Error, Debug)]
pub enum EntryLogError {
    #[error("entry log unavailable: {0}")]
    Unavailable(String),

    #[error("entry {0} not found")]
    NotFound(String),

    #[error("entry update rejected: {0}")]
    Rejected(String),
}

/// Durable state store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    #[error("stored value for '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<DatabaseError> for EntryLogError {
    fn from(err: DatabaseError) -> Self {
        EntryLogError::Unavailable(err.to_string())
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// A completed operation plus any collaborator failures absorbed on the way.
///
/// The value is always valid: a failing side effect never rolls back the
/// state transition that produced it.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<CoreError>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<CoreError>) -> Self {
        Self { value, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<CoreError>) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_map_keeps_warnings() {
        let mut outcome = Outcome::clean(2);
        outcome.push_warning(StoreError::Unavailable("disk full".into()));
        let mapped = outcome.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.warnings.len(), 1);
        assert!(!mapped.is_clean());
    }

    #[test]
    fn database_error_becomes_soft_collaborator_error() {
        let err: EntryLogError = DatabaseError::QueryFailed("boom".into()).into();
        assert!(matches!(err, EntryLogError::Unavailable(ref m) if m.contains("boom")));
    }
}
