//! Queue entry model.
//!
//! A queue entry is a registration plus the metadata needed to drain it.
//! Rows are appended by [`QueueEntry::insert`], read without removal by
//! [`QueueEntry::fetch_batch`] and removed only by [`QueueEntry::complete`],
//! which archives the entry in the same transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use orgsync_core::{Cvr, EntityKind, ObjectUuid, OperationType, Registration};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::archive_entry::{ArchiveEntry, Resolution};
use super::{from_millis, tables, to_millis};
use crate::error::DbError;

/// Priority used when a caller has no preference.
pub const DEFAULT_PRIORITY: i32 = 10;

/// A pending operation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Row id; insertion order within a kind.
    pub id: i64,
    pub kind: EntityKind,
    pub cvr: Cvr,
    pub operation: OperationType,
    /// Lower drains first.
    pub priority: i32,
    /// Ask the registry adapter to skip its unchanged-object check.
    pub bypass_cache: bool,
    pub registration: Registration,
    pub enqueued_at: DateTime<Utc>,
    /// When the change happened at the source, if known.
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Input for enqueueing an operation.
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub cvr: Cvr,
    pub operation: OperationType,
    pub priority: i32,
    pub bypass_cache: bool,
    pub registration: Registration,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl NewQueueEntry {
    /// Entry with default priority and caching.
    #[must_use]
    pub fn new(cvr: Cvr, operation: OperationType, registration: Registration) -> Self {
        Self {
            cvr,
            operation,
            priority: DEFAULT_PRIORITY,
            bypass_cache: false,
            registration,
            occurred_at: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_bypass_cache(mut self, bypass_cache: bool) -> Self {
        self.bypass_cache = bypass_cache;
        self
    }

    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

#[derive(Debug, FromRow)]
struct QueueRow {
    id: i64,
    cvr: String,
    operation: String,
    priority: i32,
    bypass_cache: bool,
    payload: String,
    enqueued_at: i64,
    occurred_at: Option<i64>,
}

#[derive(Debug, FromRow)]
struct ChildRow {
    queue_id: i64,
    collection: String,
    value: String,
}

/// One element of a multi-valued field, ready to be stored as a child row.
#[derive(Debug)]
struct ChildValue {
    collection: &'static str,
    ordinal: i64,
    value: String,
}

impl QueueRow {
    fn into_entry(self, kind: EntityKind, children: Vec<ChildRow>) -> Result<QueueEntry, DbError> {
        let cvr = self
            .cvr
            .parse::<Cvr>()
            .map_err(|e| DbError::invalid_row(e.to_string()))?;
        let operation = self
            .operation
            .parse::<OperationType>()
            .map_err(DbError::InvalidRow)?;
        let registration = merge_payload(kind, &self.payload, children)?;

        Ok(QueueEntry {
            id: self.id,
            kind,
            cvr,
            operation,
            priority: self.priority,
            bypass_cache: self.bypass_cache,
            registration,
            enqueued_at: from_millis(self.enqueued_at)?,
            occurred_at: self.occurred_at.map(from_millis).transpose()?,
        })
    }
}

/// Split a registration into its scalar JSON object and its child values.
fn split_payload(registration: &Registration) -> Result<(String, Vec<ChildValue>), DbError> {
    let mut value = registration
        .to_value()
        .map_err(|e| DbError::invalid_row(e.to_string()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| DbError::invalid_row("registration is not a JSON object"))?;

    let mut children = Vec::new();
    for &collection in Registration::child_collections(registration.kind()) {
        if let Some(Value::Array(items)) = object.remove(collection) {
            for (ordinal, item) in (0_i64..).zip(items) {
                children.push(ChildValue {
                    collection,
                    ordinal,
                    value: item.to_string(),
                });
            }
        }
    }

    Ok((value.to_string(), children))
}

/// Rebuild a registration from its scalar JSON object and ordered child rows.
fn merge_payload(
    kind: EntityKind,
    payload: &str,
    children: Vec<ChildRow>,
) -> Result<Registration, DbError> {
    let mut value: Value = serde_json::from_str(payload)
        .map_err(|e| DbError::invalid_row(format!("payload: {e}")))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| DbError::invalid_row("payload is not a JSON object"))?;

    for &collection in Registration::child_collections(kind) {
        object.insert(collection.to_string(), Value::Array(Vec::new()));
    }
    for child in children {
        let item: Value = serde_json::from_str(&child.value)
            .map_err(|e| DbError::invalid_row(format!("child {}: {e}", child.collection)))?;
        match object.get_mut(&child.collection) {
            Some(Value::Array(items)) => items.push(item),
            _ => {
                return Err(DbError::invalid_row(format!(
                    "unknown {kind} child collection '{}'",
                    child.collection
                )))
            }
        }
    }

    Registration::from_value(kind, value).map_err(|e| DbError::invalid_row(e.to_string()))
}

impl QueueEntry {
    /// Identity of the queued object.
    #[must_use]
    pub fn uuid(&self) -> ObjectUuid {
        self.registration.uuid()
    }

    /// Time to stamp on the registry call: the source change time, or the
    /// enqueue time when the source gave none.
    #[must_use]
    pub fn change_time(&self) -> DateTime<Utc> {
        self.occurred_at.unwrap_or(self.enqueued_at)
    }

    /// Append an entry and its child rows in one transaction.
    pub async fn insert(
        pool: &SqlitePool,
        input: &NewQueueEntry,
        now: DateTime<Utc>,
    ) -> Result<Self, DbError> {
        let kind = input.registration.kind();
        let t = tables(kind);
        let (payload, children) = split_payload(&input.registration)?;

        let mut tx = pool.begin().await.map_err(DbError::ConnectionFailed)?;

        let id = sqlx::query(&format!(
            r"
            INSERT INTO {} (
                uuid, cvr, operation, priority, bypass_cache, payload, enqueued_at, occurred_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            t.queue
        ))
        .bind(input.registration.uuid().to_string())
        .bind(input.cvr.as_str())
        .bind(input.operation.as_str())
        .bind(input.priority)
        .bind(input.bypass_cache)
        .bind(&payload)
        .bind(to_millis(now))
        .bind(input.occurred_at.map(to_millis))
        .execute(&mut *tx)
        .await
        .map_err(DbError::QueryFailed)?
        .last_insert_rowid();

        for child in &children {
            sqlx::query(&format!(
                "INSERT INTO {} (queue_id, collection, ordinal, value) VALUES (?, ?, ?, ?)",
                t.children
            ))
            .bind(id)
            .bind(child.collection)
            .bind(child.ordinal)
            .bind(&child.value)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryFailed)?;
        }

        tx.commit().await.map_err(DbError::QueryFailed)?;

        Ok(Self {
            id,
            kind,
            cvr: input.cvr.clone(),
            operation: input.operation,
            priority: input.priority,
            bypass_cache: input.bypass_cache,
            registration: input.registration.clone(),
            enqueued_at: from_millis(to_millis(now))?,
            occurred_at: input.occurred_at.map(to_millis).map(from_millis).transpose()?,
        })
    }

    /// Read up to `limit` entries ordered by priority, then insertion order.
    ///
    /// Rows are not removed or locked.
    pub async fn fetch_batch(
        pool: &SqlitePool,
        kind: EntityKind,
        limit: u32,
    ) -> Result<Vec<Self>, DbError> {
        let t = tables(kind);
        let rows: Vec<QueueRow> = sqlx::query_as(&format!(
            r"
            SELECT id, cvr, operation, priority, bypass_cache, payload, enqueued_at, occurred_at
            FROM {}
            ORDER BY priority ASC, id ASC
            LIMIT ?
            ",
            t.queue
        ))
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Self::attach_children(pool, kind, rows).await
    }

    /// All pending entries for one object, oldest first.
    pub async fn list_by_uuid(
        pool: &SqlitePool,
        kind: EntityKind,
        uuid: ObjectUuid,
    ) -> Result<Vec<Self>, DbError> {
        let t = tables(kind);
        let rows: Vec<QueueRow> = sqlx::query_as(&format!(
            r"
            SELECT id, cvr, operation, priority, bypass_cache, payload, enqueued_at, occurred_at
            FROM {}
            WHERE uuid = ?
            ORDER BY id ASC
            ",
            t.queue
        ))
        .bind(uuid.to_string())
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Self::attach_children(pool, kind, rows).await
    }

    /// Number of pending entries of a kind.
    pub async fn count(pool: &SqlitePool, kind: EntityKind) -> Result<i64, DbError> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", tables(kind).queue))
            .fetch_one(pool)
            .await
            .map_err(DbError::QueryFailed)
    }

    /// Archive this entry and remove it (with its child rows) from the queue,
    /// atomically.
    ///
    /// Returns `false` without archiving when the row is already gone.
    pub async fn complete(
        &self,
        pool: &SqlitePool,
        resolution: &Resolution,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let t = tables(self.kind);
        let mut tx = pool.begin().await.map_err(DbError::ConnectionFailed)?;

        sqlx::query(&format!("DELETE FROM {} WHERE queue_id = ?", t.children))
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryFailed)?;

        let deleted = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", t.queue))
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryFailed)?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(DbError::QueryFailed)?;
            return Ok(false);
        }

        ArchiveEntry::insert(&mut *tx, self, resolution, now).await?;
        tx.commit().await.map_err(DbError::QueryFailed)?;
        Ok(true)
    }

    async fn attach_children(
        pool: &SqlitePool,
        kind: EntityKind,
        rows: Vec<QueueRow>,
    ) -> Result<Vec<Self>, DbError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT queue_id, collection, value FROM {} WHERE queue_id IN (",
            tables(kind).children
        ));
        let mut ids = builder.separated(", ");
        for row in &rows {
            ids.push_bind(row.id);
        }
        ids.push_unseparated(") ORDER BY queue_id, collection, ordinal");

        let child_rows: Vec<ChildRow> = builder
            .build_query_as()
            .fetch_all(pool)
            .await
            .map_err(DbError::QueryFailed)?;

        let mut by_parent: HashMap<i64, Vec<ChildRow>> = HashMap::new();
        for child in child_rows {
            by_parent.entry(child.queue_id).or_default().push(child);
        }

        rows.into_iter()
            .map(|row| {
                let children = by_parent.remove(&row.id).unwrap_or_default();
                row.into_entry(kind, children)
            })
            .collect()
    }
}
