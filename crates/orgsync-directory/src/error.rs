//! Directory source error types.

use thiserror::Error;

/// Error returned by a directory source.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory could not be reached.
    #[error("directory unavailable: {message}")]
    Unavailable { message: String },

    /// The directory no longer accepts the stored cursor.
    #[error("invalid cursor: {message}")]
    InvalidCursor { message: String },

    /// The directory answered with something we cannot interpret.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl DirectoryError {
    /// Check if the call may succeed when repeated later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, DirectoryError::Unavailable { .. })
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        DirectoryError::Unavailable {
            message: message.into(),
        }
    }

    /// Create an invalid cursor error.
    pub fn invalid_cursor(message: impl Into<String>) -> Self {
        DirectoryError::InvalidCursor {
            message: message.into(),
        }
    }
}

/// Result type for directory calls.
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;
