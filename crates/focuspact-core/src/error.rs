//! Core error types for focuspact-core.
//!
//! This module defines the error hierarchy using thiserror. The taxonomy
//! mirrors how operations fail: unauthenticated writes, missing entities,
//! pact invariant violations, input validation, and storage faults.

use std::path::PathBuf;
use thiserror::Error;

use crate::pact::PactStatus;

/// Core error type for focuspact-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Pact invariant violations
    #[error("Pact error: {0}")]
    Pact(#[from] PactError),

    /// Write operation attempted without a resolved caller identity.
    /// Read operations never produce this; they degrade to empty results.
    #[error("Not authenticated")]
    Unauthenticated,

    /// A mutation referenced an entity that does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Caller is not on the admin allow-list
    #[error("Operation requires admin privileges")]
    NotAuthorized,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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
}

/// Validation errors, raised before any write happens.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Session duration outside the accepted range
    #[error("Session duration {seconds}s out of range (1..={max}s)")]
    DurationOutOfRange { seconds: u32, max: u32 },

    /// Session completion timestamp too far in the future
    #[error("Session completed_at {completed_at} is beyond the allowed clock skew")]
    CompletedInFuture {
        completed_at: chrono::DateTime<chrono::Utc>,
    },

    /// Pact date range is inverted
    #[error("Invalid date range: end_date ({end}) is before start_date ({start})")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Pact starts in the past
    #[error("Pact start_date ({start}) is before today ({today})")]
    StartInPast {
        start: chrono::NaiveDate,
        today: chrono::NaiveDate,
    },

    /// Pact spans too many days
    #[error("Pact spans {days} days, maximum is {max}")]
    PactTooLong { days: u32, max: u32 },

    /// Daily quota outside the accepted range
    #[error("Daily quota {quota} out of range (1..={max})")]
    QuotaOutOfRange { quota: u32, max: u32 },

    /// Challenge target must be positive
    #[error("Challenge target must be at least 1")]
    ZeroTarget,
}

/// Pact membership and lifecycle violations. These are hard errors,
/// never silently ignored.
#[derive(Error, Debug)]
pub enum PactError {
    /// Join attempted on a pact that is no longer pending
    #[error("Cannot join: pact is {status}, joining is only possible while pending")]
    JoinClosed { status: PactStatus },

    /// Join attempted after the start date
    #[error("Cannot join: pact started on {start}")]
    JoinWindowPassed { start: chrono::NaiveDate },

    /// Caller already belongs to the pact
    #[error("Already a participant of this pact")]
    AlreadyJoined,

    /// Leave attempted on a pact that is no longer pending
    #[error("Cannot leave: pact is {status}, leaving is only possible while pending")]
    LeaveClosed { status: PactStatus },

    /// Caller does not belong to the pact
    #[error("Not a participant of this pact")]
    NotAParticipant,

    /// Mutation attempted by someone other than the creator
    #[error("Only the pact creator may do this")]
    NotCreator,

    /// Update attempted on a pact that already started or ended
    #[error("Cannot update: pact is {status} and no longer editable")]
    NotEditable { status: PactStatus },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
