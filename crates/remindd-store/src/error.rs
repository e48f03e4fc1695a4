use remindd_core::{InvalidTargetError, RecurrenceError};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No reminder with the given id exists at mutation time.
    #[error("reminder not found: {id}")]
    NotFound { id: String },

    /// Rejected synchronously, never persisted: empty/overlong message,
    /// non-future one-shot time, malformed or unsupported recurrence.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A delivery target that matches none of the accepted grammars.
    /// Fails the whole operation before any persistence occurs.
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl From<InvalidTargetError> for StoreError {
    fn from(e: InvalidTargetError) -> Self {
        StoreError::InvalidTarget(e.target)
    }
}

impl From<RecurrenceError> for StoreError {
    fn from(e: RecurrenceError) -> Self {
        StoreError::InvalidInput(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
