//! Drain Engine
//!
//! Periodically drains the queue into the registry. Each tick walks the
//! kinds in [`EntityKind::ALL`] order and, for every kind not paused by
//! backoff, fetches batches sized to the worker pool and processes their
//! items concurrently until the queue is empty or a batch ends incomplete.
//!
//! Entries of one batch that target the same object run in queue order on a
//! single worker. The first one left unresolved stops that object for the
//! rest of the batch, so a later delete never overtakes an earlier update.
//!
//! Backoff is settled once per tick: progress (a success, or a batch that
//! fully resolved) resets the error streak, and if any kind ended incomplete
//! the streak advances one step and all of those kinds share the new pause.
//!
//! Outcome of one item:
//!
//! | Registry result            | Queue row          | Archive  |
//! |----------------------------|--------------------|----------|
//! | success / skipped          | removed            | success  |
//! | transient error, timeout   | left in place      | none     |
//! | permanent error            | removed            | failure  |
//!
//! Ticks are single-flight: a tick started while another is running
//! returns [`EngineError::AlreadyRunning`] without touching the queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use orgsync_core::{EntityKind, ObjectUuid, OperationType};
use orgsync_db::{QueueEntry, Resolution};
use orgsync_registry::{RegistryClient, RegistryError, RegistryResult, WriteOutcome};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::backoff::BackoffState;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::queue::OperationQueue;

/// Drain settings.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Worker pool width and batch size.
    pub workers: usize,

    /// Deadline for one registry call.
    pub item_timeout: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            item_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&EngineConfig> for DrainConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            workers: config.workers,
            item_timeout: config.item_timeout,
        }
    }
}

/// How draining one kind ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KindStatus {
    /// Queue emptied.
    Drained,
    /// A batch had unresolved items; the kind is paused.
    Incomplete,
    /// Paused by an earlier incomplete batch.
    BackedOff,
    /// The queue could not be read or written; the tick was aborted.
    StorageError,
}

/// Result of draining one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub kind: EntityKind,
    pub status: KindStatus,
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
}

impl KindReport {
    fn new(kind: EntityKind, status: KindStatus) -> Self {
        Self {
            kind,
            status,
            batches: 0,
            succeeded: 0,
            failed: 0,
            pending: 0,
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub kinds: Vec<KindReport>,
    /// A storage error stopped the tick before every kind was visited.
    pub aborted: bool,
}

impl TickReport {
    #[must_use]
    pub fn for_kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|r| r.kind == kind)
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.kinds.iter().map(|r| r.succeeded).sum()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.kinds.iter().map(|r| r.failed).sum()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.kinds.iter().map(|r| r.pending).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Succeeded,
    Failed,
    Pending,
    StorageFailed,
}

#[derive(Debug, Default)]
struct BatchTally {
    succeeded: usize,
    failed: usize,
    pending: usize,
    storage_failed: bool,
}

impl BatchTally {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Pending => self.pending += 1,
            ItemOutcome::StorageFailed => {
                self.pending += 1;
                self.storage_failed = true;
            }
        }
    }

    fn resolved(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Drains the operation queue into the registry.
pub struct SyncEngine<R: RegistryClient> {
    queue: OperationQueue,
    registry: Arc<R>,
    config: DrainConfig,
    backoff: Mutex<BackoffState>,
    running: AtomicBool,
}

impl<R: RegistryClient + 'static> SyncEngine<R> {
    /// Create a new engine.
    pub fn new(queue: OperationQueue, registry: Arc<R>, config: DrainConfig) -> Self {
        Self {
            queue,
            registry,
            config,
            backoff: Mutex::new(BackoffState::new()),
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Current error streak.
    #[must_use]
    pub fn error_streak(&self) -> u32 {
        self.backoff().streak()
    }

    /// When `kind` may next be drained, if it is or was paused.
    #[must_use]
    pub fn next_allowed_run(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        self.backoff().next_allowed_run(kind)
    }

    /// Check if a tick is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one drain tick now.
    pub async fn tick(&self) -> EngineResult<TickReport> {
        self.tick_at(Utc::now()).await
    }

    /// Run one drain tick as of `now`.
    #[instrument(skip(self))]
    pub async fn tick_at(&self, now: DateTime<Utc>) -> EngineResult<TickReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain tick already running, skipping");
            return Err(EngineError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let mut report = TickReport::default();
        let mut progressed = false;
        let mut incomplete = Vec::new();
        for kind in EntityKind::ALL {
            if !self.backoff().is_allowed(kind, now) {
                debug!(kind = %kind, "Drain paused by backoff");
                report.kinds.push(KindReport::new(kind, KindStatus::BackedOff));
                continue;
            }

            let (kind_report, kind_progressed) = self.drain_kind(kind, now).await;
            progressed |= kind_progressed;
            let storage_error = kind_report.status == KindStatus::StorageError;
            if storage_error || kind_report.status == KindStatus::Incomplete {
                incomplete.push(kind);
            }
            report.kinds.push(kind_report);
            if storage_error {
                report.aborted = true;
                break;
            }
        }

        {
            let mut backoff = self.backoff();
            if progressed {
                backoff.record_success();
            }
            if !incomplete.is_empty() {
                backoff.record_incomplete(&incomplete, now);
            }
        }

        if report.succeeded() + report.failed() + report.pending() > 0 {
            info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                pending = report.pending(),
                aborted = report.aborted,
                "Drain tick finished"
            );
        }
        Ok(report)
    }

    /// Drain `kind` until empty or incomplete. The flag tells whether any
    /// progress was made.
    async fn drain_kind(&self, kind: EntityKind, now: DateTime<Utc>) -> (KindReport, bool) {
        let mut report = KindReport::new(kind, KindStatus::Drained);
        let mut progressed = false;

        loop {
            let batch = match self.queue.dequeue_batch(kind, self.config.workers).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(kind = %kind, error = %e, "Failed to read queue");
                    report.status = KindStatus::StorageError;
                    return (report, progressed);
                }
            };
            if batch.is_empty() {
                return (report, progressed);
            }

            let size = batch.len();
            report.batches += 1;
            debug!(kind = %kind, count = size, "Processing batch");

            let tally = self.process_batch(batch, now).await;
            report.succeeded += tally.succeeded;
            report.failed += tally.failed;
            report.pending += tally.pending;

            let incomplete = tally.resolved() < size;
            progressed |= tally.succeeded > 0 || !incomplete;
            if incomplete {
                report.status = if tally.storage_failed {
                    KindStatus::StorageError
                } else {
                    KindStatus::Incomplete
                };
                return (report, progressed);
            }
        }
    }

    async fn process_batch(&self, batch: Vec<QueueEntry>, now: DateTime<Utc>) -> BatchTally {
        let size = batch.len();
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();

        for group in group_by_object(batch) {
            let semaphore = semaphore.clone();
            let queue = self.queue.clone();
            let registry = self.registry.clone();
            let item_timeout = self.config.item_timeout;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return vec![ItemOutcome::Pending; group.len()];
                };
                process_group(&queue, registry.as_ref(), group, item_timeout, now).await
            });
        }

        let mut tally = BatchTally::default();
        let mut recorded = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcomes) => {
                    recorded += outcomes.len();
                    for outcome in outcomes {
                        tally.record(outcome);
                    }
                }
                Err(e) => error!(error = %e, "Queue item task failed"),
            }
        }
        // Entries of a failed task stay queued.
        for _ in recorded..size {
            tally.record(ItemOutcome::Pending);
        }
        tally
    }

    fn backoff(&self) -> MutexGuard<'_, BackoffState> {
        self.backoff.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Split a batch into per-object runs, keeping queue order within each run
/// and first-appearance order between runs.
fn group_by_object(batch: Vec<QueueEntry>) -> Vec<Vec<QueueEntry>> {
    let mut index: HashMap<ObjectUuid, usize> = HashMap::new();
    let mut groups: Vec<Vec<QueueEntry>> = Vec::new();
    for entry in batch {
        match index.get(&entry.uuid()) {
            Some(&i) => groups[i].push(entry),
            None => {
                index.insert(entry.uuid(), groups.len());
                groups.push(vec![entry]);
            }
        }
    }
    groups
}

/// Process one object's entries in order. Stops at the first entry left
/// unresolved; it and everything after it stay queued.
async fn process_group<R: RegistryClient + ?Sized>(
    queue: &OperationQueue,
    registry: &R,
    group: Vec<QueueEntry>,
    item_timeout: Duration,
    now: DateTime<Utc>,
) -> Vec<ItemOutcome> {
    let total = group.len();
    let mut outcomes = Vec::with_capacity(total);
    for entry in group {
        let outcome = process_item(queue, registry, entry, item_timeout, now).await;
        outcomes.push(outcome);
        if matches!(outcome, ItemOutcome::Pending | ItemOutcome::StorageFailed) {
            break;
        }
    }
    outcomes.resize(total, ItemOutcome::Pending);
    outcomes
}

/// Call the registry for one entry and record a terminal outcome.
async fn process_item<R: RegistryClient + ?Sized>(
    queue: &OperationQueue,
    registry: &R,
    entry: QueueEntry,
    item_timeout: Duration,
    now: DateTime<Utc>,
) -> ItemOutcome {
    let result = match tokio::time::timeout(item_timeout, dispatch(registry, &entry)).await {
        Ok(result) => result,
        Err(_) => Err(RegistryError::Timeout {
            timeout_secs: item_timeout.as_secs(),
        }),
    };

    let resolution = match result {
        Ok(outcome) => Resolution::Success {
            skipped: outcome.is_skipped(),
        },
        Err(e) if e.is_transient() => {
            warn!(
                kind = %entry.kind,
                uuid = %entry.uuid(),
                cvr = %entry.cvr,
                error = %e,
                "Registry call failed, leaving entry queued"
            );
            return ItemOutcome::Pending;
        }
        Err(e) => {
            warn!(
                kind = %entry.kind,
                uuid = %entry.uuid(),
                cvr = %entry.cvr,
                error_code = e.error_code(),
                error = %e,
                "Registry rejected entry, archiving as failure"
            );
            Resolution::Failure {
                error: e.to_string(),
            }
        }
    };

    match queue.complete(&entry, &resolution, now).await {
        Ok(_) => match resolution {
            Resolution::Success { .. } => ItemOutcome::Succeeded,
            Resolution::Failure { .. } => ItemOutcome::Failed,
        },
        Err(e) => {
            error!(
                kind = %entry.kind,
                uuid = %entry.uuid(),
                error = %e,
                "Failed to complete queue entry"
            );
            ItemOutcome::StorageFailed
        }
    }
}

async fn dispatch<R: RegistryClient + ?Sized>(
    registry: &R,
    entry: &QueueEntry,
) -> RegistryResult<WriteOutcome> {
    match entry.operation {
        OperationType::Update => {
            registry
                .update(&entry.cvr, &entry.registration, entry.bypass_cache)
                .await
        }
        OperationType::Delete => {
            registry
                .delete(&entry.cvr, entry.kind, entry.uuid(), entry.change_time())
                .await
        }
        OperationType::Deactivate => {
            registry
                .deactivate(&entry.cvr, entry.kind, entry.uuid(), entry.change_time())
                .await
        }
    }
}
