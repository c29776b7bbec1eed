//! Durable Operation Queue
//!
//! Per-kind work queue backed by SQLite. Entries are read without being
//! removed; an entry leaves the queue only when [`OperationQueue::complete`]
//! archives it, so a crash mid-batch means the batch is simply read again.

use chrono::{DateTime, Utc};
use orgsync_core::{Cvr, EntityKind, ObjectUuid, OperationType, Registration};
use orgsync_db::{ArchiveEntry, ArchiveOutcome, DbPool, NewQueueEntry, QueueEntry, Resolution};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{QueueError, QueueResult};

/// Queue depth and archive sizes for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub kind: EntityKind,
    pub pending: i64,
    pub succeeded: i64,
    pub failed: i64,
}

/// Queue statistics across all kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub kinds: Vec<KindStats>,
}

impl QueueStats {
    /// Stats for one kind.
    #[must_use]
    pub fn for_kind(&self, kind: EntityKind) -> Option<&KindStats> {
        self.kinds.iter().find(|s| s.kind == kind)
    }

    /// Pending entries across all kinds.
    #[must_use]
    pub fn total_pending(&self) -> i64 {
        self.kinds.iter().map(|s| s.pending).sum()
    }
}

/// Operation queue service.
#[derive(Debug, Clone)]
pub struct OperationQueue {
    pool: DbPool,
}

impl OperationQueue {
    /// Create a queue over an already migrated pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Append a registration for the registry.
    ///
    /// Not idempotent: saving the same registration twice queues it twice.
    #[instrument(skip(self, registration), fields(kind = %registration.kind(), uuid = %registration.uuid()))]
    pub async fn save(
        &self,
        registration: Registration,
        operation: OperationType,
        bypass_cache: bool,
        priority: i32,
        cvr: &Cvr,
    ) -> QueueResult<QueueEntry> {
        let entry = NewQueueEntry::new(cvr.clone(), operation, registration)
            .with_priority(priority)
            .with_bypass_cache(bypass_cache);
        self.enqueue(entry).await
    }

    /// Append a prepared entry.
    pub async fn enqueue(&self, entry: NewQueueEntry) -> QueueResult<QueueEntry> {
        if entry.operation == OperationType::Update && registration_is_blank(&entry.registration)
        {
            return Err(QueueError::invalid_entry(format!(
                "update of {} {} carries no name",
                entry.registration.kind(),
                entry.registration.uuid()
            )));
        }

        let queued = QueueEntry::insert(self.pool.inner(), &entry, Utc::now()).await?;
        debug!(
            id = queued.id,
            kind = %queued.kind,
            uuid = %queued.uuid(),
            cvr = %queued.cvr,
            operation = %queued.operation,
            priority = queued.priority,
            "Queued operation"
        );
        Ok(queued)
    }

    /// Up to `n` pending entries of `kind`, lowest priority value first.
    pub async fn dequeue_batch(&self, kind: EntityKind, n: usize) -> QueueResult<Vec<QueueEntry>> {
        let limit = u32::try_from(n).unwrap_or(u32::MAX);
        Ok(QueueEntry::fetch_batch(self.pool.inner(), kind, limit).await?)
    }

    /// Archive a terminally resolved entry and remove it from the queue.
    ///
    /// Returns `false` when the entry had already been completed.
    pub async fn complete(
        &self,
        entry: &QueueEntry,
        resolution: &Resolution,
        now: DateTime<Utc>,
    ) -> QueueResult<bool> {
        Ok(entry.complete(self.pool.inner(), resolution, now).await?)
    }

    /// Purge success archive rows older than `retention`. Failure rows are
    /// kept.
    #[instrument(skip(self))]
    pub async fn retention_cleanup(
        &self,
        now: DateTime<Utc>,
        retention: chrono::Duration,
    ) -> QueueResult<u64> {
        let cutoff = now - retention;
        let mut total = 0;
        for kind in EntityKind::ALL {
            let deleted =
                ArchiveEntry::delete_successes_before(self.pool.inner(), kind, cutoff).await?;
            if deleted > 0 {
                info!(kind = %kind, count = deleted, "Purged success archive rows");
            }
            total += deleted;
        }
        Ok(total)
    }

    /// Queue depth and archive sizes per kind.
    pub async fn stats(&self) -> QueueResult<QueueStats> {
        let pool = self.pool.inner();
        let mut kinds = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            kinds.push(KindStats {
                kind,
                pending: QueueEntry::count(pool, kind).await?,
                succeeded: ArchiveEntry::count(pool, kind, ArchiveOutcome::Success).await?,
                failed: ArchiveEntry::count(pool, kind, ArchiveOutcome::Failure).await?,
            });
        }
        Ok(QueueStats { kinds })
    }

    /// Failure archive, newest first.
    pub async fn failures(&self, kind: EntityKind, limit: u32) -> QueueResult<Vec<ArchiveEntry>> {
        Ok(ArchiveEntry::list_failures(self.pool.inner(), kind, limit).await?)
    }

    /// Pending entries for one object.
    pub async fn pending(&self, kind: EntityKind, uuid: ObjectUuid) -> QueueResult<Vec<QueueEntry>> {
        Ok(QueueEntry::list_by_uuid(self.pool.inner(), kind, uuid).await?)
    }

    /// Archive rows for one object.
    pub async fn archived(
        &self,
        kind: EntityKind,
        outcome: ArchiveOutcome,
        uuid: ObjectUuid,
    ) -> QueueResult<Vec<ArchiveEntry>> {
        Ok(ArchiveEntry::list_by_uuid(self.pool.inner(), kind, outcome, uuid).await?)
    }
}

fn registration_is_blank(registration: &Registration) -> bool {
    match registration {
        Registration::OrgUnit(ou) => ou.name.trim().is_empty(),
        Registration::User(user) => user.user_id.trim().is_empty(),
    }
}
