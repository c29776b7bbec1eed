//! Registry client error types
//!
//! Every error is either transient (the item stays queued and is retried on
//! a later drain) or permanent (the item is archived as a failure).

use thiserror::Error;

/// Error returned by a registry client.
#[derive(Debug, Error)]
pub enum RegistryError {
    // Transient
    /// The registry could not be reached.
    #[error("registry unavailable: {message}")]
    Unavailable { message: String },

    /// The call did not finish in time.
    #[error("registry call timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The registry asked us to come back later.
    #[error("registry asked to retry later: {message}")]
    RetryLater { message: String },

    // Permanent
    /// The registry refused the operation.
    #[error("registry rejected operation: {message}")]
    Rejected { message: String },

    /// The payload could not be turned into a registry request.
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },

    /// Unexpected failure inside the client.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RegistryError {
    /// Check if the operation should be retried on a later drain.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RegistryError::Unavailable { .. }
                | RegistryError::Timeout { .. }
                | RegistryError::RetryLater { .. }
        )
    }

    /// Check if retrying will not help.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::Unavailable { .. } => "UNAVAILABLE",
            RegistryError::Timeout { .. } => "TIMEOUT",
            RegistryError::RetryLater { .. } => "RETRY_LATER",
            RegistryError::Rejected { .. } => "REJECTED",
            RegistryError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            RegistryError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        RegistryError::Unavailable {
            message: message.into(),
        }
    }

    /// Create a retry-later error.
    pub fn retry_later(message: impl Into<String>) -> Self {
        RegistryError::RetryLater {
            message: message.into(),
        }
    }

    /// Create a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        RegistryError::Rejected {
            message: message.into(),
        }
    }

    /// Create an invalid payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        RegistryError::InvalidPayload {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        RegistryError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error with source.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RegistryError::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for registry calls.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
