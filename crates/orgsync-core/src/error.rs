//! Error Types
//!
//! Errors raised while building or decoding registration payloads.

use thiserror::Error;

use crate::ids::ParseIdError;
use crate::types::EntityKind;

/// Error type for the shared domain types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier (CVR, uuid) failed to parse.
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),

    /// A payload does not have the shape expected for its kind.
    #[error("Invalid {kind} payload: {message}")]
    InvalidPayload {
        /// Kind the payload was decoded as
        kind: EntityKind,
        /// Description of the failure
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create an invalid payload error.
    pub fn payload(kind: EntityKind, message: impl Into<String>) -> Self {
        CoreError::InvalidPayload {
            kind,
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
