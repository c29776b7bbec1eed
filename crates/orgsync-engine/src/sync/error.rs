//! Sync error types.

use orgsync_directory::DirectoryError;
use orgsync_registry::RegistryError;
use thiserror::Error;

use crate::error::QueueError;

/// Errors that can occur during directory synchronization and reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Directory call failed.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Registry call failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Queue or cursor storage failed.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// A record could not be mapped; it is dropped, not retried.
    #[error("Mapping error: attribute '{attribute}' - {message}")]
    Mapping { attribute: String, message: String },

    /// The tracker is not configured for this operation.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SyncError {
    /// Create a mapping error.
    pub fn mapping(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if the failed run may succeed when repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Directory(e) => e.is_transient(),
            SyncError::Registry(e) => e.is_transient(),
            SyncError::Queue(e) => e.is_storage(),
            SyncError::Mapping { .. } | SyncError::Configuration { .. } => false,
        }
    }

    /// Check if this error is about one record's data.
    #[must_use]
    pub fn is_mapping(&self) -> bool {
        matches!(self, SyncError::Mapping { .. })
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
