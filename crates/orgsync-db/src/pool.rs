//! Connection pool.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Maximum connections for a file-backed database.
const MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits for a competing lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the SQLite database.
///
/// Cheap to clone; all clones share the same pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: SqlitePool,
}

impl DbPool {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite://orgsync.db`.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(DbError::ConnectionFailed)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let inner = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(DbError::ConnectionFailed)?;

        tracing::debug!(url = %url, "Opened database");
        Ok(Self { inner })
    }

    /// Open a private in-memory database.
    ///
    /// Every connection to `sqlite::memory:` is a separate database, so the
    /// pool is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(DbError::ConnectionFailed)?
            .foreign_keys(true);

        let inner = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(DbError::ConnectionFailed)?;

        Ok(Self { inner })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(inner: SqlitePool) -> Self {
        Self { inner }
    }

    /// The underlying `sqlx` pool.
    #[must_use]
    pub fn inner(&self) -> &SqlitePool {
        &self.inner
    }

    /// Close every connection.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_is_usable() {
        let pool = DbPool::in_memory().await.unwrap();
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(pool.inner())
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let err = DbPool::connect("postgres://nope").await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
