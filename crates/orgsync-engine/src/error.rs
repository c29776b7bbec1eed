//! Engine error types.

use orgsync_db::DbError;
use thiserror::Error;

/// Errors from the operation queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Storage failure.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The entry cannot be queued as given.
    #[error("Invalid queue entry: {message}")]
    InvalidEntry { message: String },
}

impl QueueError {
    /// Create an invalid entry error.
    pub fn invalid_entry(message: impl Into<String>) -> Self {
        Self::InvalidEntry {
            message: message.into(),
        }
    }

    /// Check if this error came from the storage layer.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, QueueError::Database(_))
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors from the drain engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A tick is already in progress; this one was suppressed.
    #[error("A drain tick is already running")]
    AlreadyRunning,

    /// Queue failure outside of per-kind draining.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl EngineError {
    /// Check if the tick was suppressed by single-flight.
    #[must_use]
    pub fn is_already_running(&self) -> bool {
        matches!(self, EngineError::AlreadyRunning)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
