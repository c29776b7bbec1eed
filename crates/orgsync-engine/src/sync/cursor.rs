//! Directory cursor persistence.
//!
//! One cursor per directory source, stored in the key/value table. A missing
//! cursor means the next sync must enumerate the whole directory.

use chrono::Utc;
use orgsync_db::{DbPool, SyncCursor};
use tracing::{debug, info, instrument};

use super::error::SyncResult;
use crate::error::QueueError;

const KEY_PREFIX: &str = "directory_cursor:";

/// Storage key for the cursor of `source_key`.
#[must_use]
pub fn cursor_key(source_key: &str) -> String {
    format!("{KEY_PREFIX}{source_key}")
}

/// Reads and writes directory cursors.
#[derive(Debug, Clone)]
pub struct CursorStore {
    pool: DbPool,
}

impl CursorStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Stored cursor of a source, if any.
    #[instrument(skip(self))]
    pub async fn get(&self, source_key: &str) -> SyncResult<Option<Vec<u8>>> {
        let cursor = SyncCursor::get(self.pool.inner(), &cursor_key(source_key))
            .await
            .map_err(QueueError::from)?;
        Ok(cursor.map(|c| c.value))
    }

    /// Persist the cursor to resume from.
    #[instrument(skip(self, value), fields(len = value.len()))]
    pub async fn save(&self, source_key: &str, value: &[u8]) -> SyncResult<()> {
        SyncCursor::upsert(self.pool.inner(), &cursor_key(source_key), value, Utc::now())
            .await
            .map_err(QueueError::from)?;
        debug!(source = source_key, "Saved directory cursor");
        Ok(())
    }

    /// Drop the cursor so the next sync enumerates everything. Returns true
    /// if a cursor existed.
    #[instrument(skip(self))]
    pub async fn reset(&self, source_key: &str) -> SyncResult<bool> {
        let existed = SyncCursor::delete(self.pool.inner(), &cursor_key(source_key))
            .await
            .map_err(QueueError::from)?;
        if existed {
            info!(source = source_key, "Reset directory cursor");
        }
        Ok(existed)
    }
}
