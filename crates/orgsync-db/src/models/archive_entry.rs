//! Archive entry model.
//!
//! Write-once snapshot of a queue entry taken when it reached a terminal
//! outcome. Success rows are retention-bounded; failure rows are the
//! durable audit trail of permanent registry rejections.

use chrono::{DateTime, Utc};
use orgsync_core::{Cvr, EntityKind, ObjectUuid, OperationType, Registration};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::queue_entry::QueueEntry;
use super::{from_millis, tables, to_millis};
use crate::error::DbError;

/// Which archive a row lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveOutcome {
    Success,
    Failure,
}

impl ArchiveOutcome {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveOutcome::Success => "success",
            ArchiveOutcome::Failure => "failure",
        }
    }

    fn table(self, kind: EntityKind) -> &'static str {
        let t = tables(kind);
        match self {
            ArchiveOutcome::Success => t.success,
            ArchiveOutcome::Failure => t.failure,
        }
    }
}

impl std::fmt::Display for ArchiveOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of one queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The registry accepted the operation. `skipped` is set when it had
    /// nothing to change.
    Success { skipped: bool },
    /// The registry rejected the operation for good.
    Failure { error: String },
}

impl Resolution {
    /// Archive this resolution is written to.
    #[must_use]
    pub fn outcome(&self) -> ArchiveOutcome {
        match self {
            Resolution::Success { .. } => ArchiveOutcome::Success,
            Resolution::Failure { .. } => ArchiveOutcome::Failure,
        }
    }
}

/// An archived queue entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveEntry {
    pub id: i64,
    /// Row id the entry had in the queue.
    pub queue_id: i64,
    pub kind: EntityKind,
    pub outcome: ArchiveOutcome,
    pub uuid: ObjectUuid,
    pub cvr: Cvr,
    pub operation: OperationType,
    pub priority: i32,
    pub bypass_cache: bool,
    /// Full registration, child collections included.
    pub registration: Registration,
    pub enqueued_at: DateTime<Utc>,
    /// Source change time carried over from the queue entry.
    pub occurred_at: Option<DateTime<Utc>>,
    pub archived_at: DateTime<Utc>,
    pub error: Option<String>,
    pub skipped: bool,
}

#[derive(Debug, FromRow)]
struct ArchiveRow {
    id: i64,
    queue_id: i64,
    uuid: String,
    cvr: String,
    operation: String,
    priority: i32,
    bypass_cache: bool,
    payload: String,
    enqueued_at: i64,
    occurred_at: Option<i64>,
    archived_at: i64,
    error: Option<String>,
    skipped: bool,
}

impl ArchiveRow {
    fn into_entry(self, kind: EntityKind, outcome: ArchiveOutcome) -> Result<ArchiveEntry, DbError> {
        let payload: serde_json::Value = serde_json::from_str(&self.payload)
            .map_err(|e| DbError::invalid_row(format!("archive payload: {e}")))?;

        Ok(ArchiveEntry {
            id: self.id,
            queue_id: self.queue_id,
            kind,
            outcome,
            uuid: self
                .uuid
                .parse::<ObjectUuid>()
                .map_err(|e| DbError::invalid_row(e.to_string()))?,
            cvr: self
                .cvr
                .parse::<Cvr>()
                .map_err(|e| DbError::invalid_row(e.to_string()))?,
            operation: self
                .operation
                .parse::<OperationType>()
                .map_err(DbError::InvalidRow)?,
            priority: self.priority,
            bypass_cache: self.bypass_cache,
            registration: Registration::from_value(kind, payload)
                .map_err(|e| DbError::invalid_row(e.to_string()))?,
            enqueued_at: from_millis(self.enqueued_at)?,
            occurred_at: self.occurred_at.map(from_millis).transpose()?,
            archived_at: from_millis(self.archived_at)?,
            error: self.error,
            skipped: self.skipped,
        })
    }
}

const ARCHIVE_COLUMNS: &str = "id, queue_id, uuid, cvr, operation, priority, bypass_cache, \
                               payload, enqueued_at, occurred_at, archived_at, error, skipped";

impl ArchiveEntry {
    /// Snapshot `entry` into the archive matching `resolution`.
    ///
    /// Runs on the caller's connection so it can share the transaction that
    /// removes the queue row.
    pub(crate) async fn insert(
        conn: &mut SqliteConnection,
        entry: &QueueEntry,
        resolution: &Resolution,
        now: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let payload = entry
            .registration
            .to_value()
            .map_err(|e| DbError::invalid_row(e.to_string()))?
            .to_string();
        let (error, skipped) = match resolution {
            Resolution::Success { skipped } => (None, *skipped),
            Resolution::Failure { error } => (Some(error.as_str()), false),
        };

        let result = sqlx::query(&format!(
            r"
            INSERT INTO {} (
                queue_id, uuid, cvr, operation, priority, bypass_cache,
                payload, enqueued_at, occurred_at, archived_at, error, skipped
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            resolution.outcome().table(entry.kind)
        ))
        .bind(entry.id)
        .bind(entry.uuid().to_string())
        .bind(entry.cvr.as_str())
        .bind(entry.operation.as_str())
        .bind(entry.priority)
        .bind(entry.bypass_cache)
        .bind(payload)
        .bind(to_millis(entry.enqueued_at))
        .bind(entry.occurred_at.map(to_millis))
        .bind(to_millis(now))
        .bind(error)
        .bind(skipped)
        .execute(conn)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(result.last_insert_rowid())
    }

    /// Delete success rows archived before `cutoff`. Returns rows deleted.
    pub async fn delete_successes_before(
        pool: &SqlitePool,
        kind: EntityKind,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE archived_at < ?",
            tables(kind).success
        ))
        .bind(to_millis(cutoff))
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(result.rows_affected())
    }

    /// Most recent failures first.
    pub async fn list_failures(
        pool: &SqlitePool,
        kind: EntityKind,
        limit: u32,
    ) -> Result<Vec<Self>, DbError> {
        let rows: Vec<ArchiveRow> = sqlx::query_as(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM {} ORDER BY archived_at DESC, id DESC LIMIT ?",
            tables(kind).failure
        ))
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        rows.into_iter()
            .map(|row| row.into_entry(kind, ArchiveOutcome::Failure))
            .collect()
    }

    /// Archive rows for one object, oldest first.
    pub async fn list_by_uuid(
        pool: &SqlitePool,
        kind: EntityKind,
        outcome: ArchiveOutcome,
        uuid: ObjectUuid,
    ) -> Result<Vec<Self>, DbError> {
        let rows: Vec<ArchiveRow> = sqlx::query_as(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM {} WHERE uuid = ? ORDER BY id ASC",
            outcome.table(kind)
        ))
        .bind(uuid.to_string())
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        rows.into_iter()
            .map(|row| row.into_entry(kind, outcome))
            .collect()
    }

    /// Number of rows in one archive.
    pub async fn count(
        pool: &SqlitePool,
        kind: EntityKind,
        outcome: ArchiveOutcome,
    ) -> Result<i64, DbError> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", outcome.table(kind)))
            .fetch_one(pool)
            .await
            .map_err(DbError::QueryFailed)
    }
}
