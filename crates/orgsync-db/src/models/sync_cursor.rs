//! Sync cursor model.
//!
//! Opaque change-feed cursors persisted in the generic `kv_store` table,
//! one row per directory source. A missing row means no incremental state.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::{from_millis, to_millis};
use crate::error::DbError;

/// A persisted cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCursor {
    pub key: String,
    pub value: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SyncCursorRow {
    key: String,
    value: Vec<u8>,
    updated_at: i64,
}

impl SyncCursorRow {
    fn into_cursor(self) -> Result<SyncCursor, DbError> {
        Ok(SyncCursor {
            key: self.key,
            value: self.value,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

impl SyncCursor {
    /// Load the cursor stored under `key`.
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<Self>, DbError> {
        let row: Option<SyncCursorRow> =
            sqlx::query_as("SELECT key, value, updated_at FROM kv_store WHERE key = ?")
                .bind(key)
                .fetch_optional(pool)
                .await
                .map_err(DbError::QueryFailed)?;

        row.map(SyncCursorRow::into_cursor).transpose()
    }

    /// Insert or replace the cursor stored under `key`.
    pub async fn upsert(
        pool: &SqlitePool,
        key: &str,
        value: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(to_millis(now))
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(())
    }

    /// Remove the cursor. Returns true if one existed.
    pub async fn delete(pool: &SqlitePool, key: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(pool)
            .await
            .map_err(DbError::QueryFailed)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::pool::DbPool;

    #[tokio::test]
    async fn test_cursor_lifecycle() {
        let pool = DbPool::in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let key = "directory:ad";

        assert!(SyncCursor::get(pool.inner(), key).await.unwrap().is_none());

        SyncCursor::upsert(pool.inner(), key, &[1, 2, 3], Utc::now())
            .await
            .unwrap();
        SyncCursor::upsert(pool.inner(), key, &[4, 5], Utc::now())
            .await
            .unwrap();
        let cursor = SyncCursor::get(pool.inner(), key).await.unwrap().unwrap();
        assert_eq!(cursor.value, vec![4, 5]);

        assert!(SyncCursor::delete(pool.inner(), key).await.unwrap());
        assert!(!SyncCursor::delete(pool.inner(), key).await.unwrap());
        assert!(SyncCursor::get(pool.inner(), key).await.unwrap().is_none());
    }
}
