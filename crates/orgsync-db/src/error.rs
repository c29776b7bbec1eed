//! Error types for the orgsync-db crate.
//!
//! Wraps `SQLx` errors with the operation that produced them.

use thiserror::Error;

/// Database operation errors.
///
/// # Example
///
/// ```rust
/// use orgsync_db::DbError;
///
/// fn handle_error(err: DbError) {
///     match err {
///         DbError::ConnectionFailed(e) => eprintln!("Cannot connect: {}", e),
///         DbError::MigrationFailed(e) => eprintln!("Migration error: {}", e),
///         DbError::QueryFailed(e) => eprintln!("Query error: {}", e),
///         DbError::InvalidRow(msg) => eprintln!("Corrupt row: {}", msg),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to open the database or acquire a connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// A stored row could not be decoded into its domain type.
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl DbError {
    /// Create an invalid row error.
    pub fn invalid_row(message: impl Into<String>) -> Self {
        DbError::InvalidRow(message.into())
    }

    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error indicates a query problem.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, DbError::QueryFailed(_))
    }
}
