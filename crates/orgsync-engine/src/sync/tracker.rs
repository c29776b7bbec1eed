//! Directory change tracker.
//!
//! Turns the directory's change feed into queue entries. Without a stored
//! cursor the whole directory is enumerated; otherwise only the changes
//! after the cursor are read, page by page. A cursor is persisted only after
//! every record of its page has been queued, so a crash replays the page.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use orgsync_core::Cvr;
use orgsync_db::{NewQueueEntry, DEFAULT_PRIORITY};
use orgsync_directory::{DirectoryError, DirectoryRecord, DirectorySource};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::cursor::CursorStore;
use super::enrich::Enricher;
use super::error::{SyncError, SyncResult};
use super::event::DomainEvent;
use super::filter::{Filter, FilterDecision};
use super::mapper::EventMapper;
use crate::queue::OperationQueue;

/// Default number of changes per page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// How a tracker run read the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

/// Counters for one tracker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub pages: usize,
    /// Records returned by the directory.
    pub seen: usize,
    pub enqueued: usize,
    /// Updates turned into deletions by the filter.
    pub tombstoned: usize,
    /// Records of no synchronized kind.
    pub ignored: usize,
    /// Records that could not be mapped.
    pub dropped: usize,
}

impl SyncReport {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            pages: 0,
            seen: 0,
            enqueued: 0,
            tombstoned: 0,
            ignored: 0,
            dropped: 0,
        }
    }
}

/// Feeds directory changes into the operation queue.
pub struct ChangeTracker<D: DirectorySource> {
    source: Arc<D>,
    queue: OperationQueue,
    cursors: CursorStore,
    filter: Filter,
    mapper: EventMapper,
    cvr: Cvr,
    page_size: u32,
    priority: i32,
}

impl<D: DirectorySource> ChangeTracker<D> {
    /// Create a tracker for one directory source and tenant.
    pub fn new(
        source: Arc<D>,
        queue: OperationQueue,
        cursors: CursorStore,
        filter: Filter,
        cvr: Cvr,
    ) -> Self {
        Self {
            source,
            queue,
            cursors,
            filter,
            mapper: EventMapper::new(),
            cvr,
            page_size: DEFAULT_PAGE_SIZE,
            priority: DEFAULT_PRIORITY,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: EventMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Queue priority of directory changes.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn cursors(&self) -> &CursorStore {
        &self.cursors
    }

    /// Run one sync pass.
    #[instrument(skip(self), fields(source = self.source.source_key(), cvr = %self.cvr))]
    pub async fn run_once(&self) -> SyncResult<SyncReport> {
        let key = self.source.source_key().to_string();
        let now = Utc::now();

        let report = match self.cursors.get(&key).await? {
            None => self.full_sync(&key, now).await?,
            Some(cursor) => match self.incremental_sync(&key, cursor, now).await {
                Err(SyncError::Directory(DirectoryError::InvalidCursor { message })) => {
                    warn!(
                        source = %key,
                        error = %message,
                        "Stored cursor rejected, falling back to full enumeration"
                    );
                    self.full_sync(&key, now).await?
                }
                other => other?,
            },
        };

        info!(
            mode = ?report.mode,
            pages = report.pages,
            seen = report.seen,
            enqueued = report.enqueued,
            tombstoned = report.tombstoned,
            dropped = report.dropped,
            "Directory sync finished"
        );
        Ok(report)
    }

    async fn full_sync(&self, key: &str, now: DateTime<Utc>) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(SyncMode::Full);
        let mut enricher = Enricher::new(self.filter.config().root_dn.clone());

        // Taken first so changes made while listing are replayed next run.
        let baseline = self.source.current_cursor().await?;
        let records = self.source.all_current().await?;
        report.pages = 1;

        for record in records {
            self.process_record(&mut enricher, record, now, &mut report)
                .await?;
        }

        self.cursors.save(key, &baseline).await?;
        Ok(report)
    }

    async fn incremental_sync(
        &self,
        key: &str,
        mut cursor: Vec<u8>,
        now: DateTime<Utc>,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(SyncMode::Incremental);
        let mut enricher = Enricher::new(self.filter.config().root_dn.clone());

        loop {
            let page = self.source.changes_since(&cursor, self.page_size).await?;
            report.pages += 1;
            debug!(count = page.records.len(), has_more = page.has_more, "Read change page");

            for record in page.records {
                self.process_record(&mut enricher, record, now, &mut report)
                    .await?;
            }

            self.cursors.save(key, &page.cursor).await?;
            cursor = page.cursor;
            if !page.has_more {
                return Ok(report);
            }
        }
    }

    async fn process_record(
        &self,
        enricher: &mut Enricher,
        record: DirectoryRecord,
        now: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        report.seen += 1;
        let dn = record.dn.clone();

        let event = match DomainEvent::from_record(record, now) {
            Ok(Some(event)) => event,
            Ok(None) => {
                report.ignored += 1;
                return Ok(());
            }
            Err(e) if e.is_mapping() => {
                warn!(dn = %dn, error = %e, "Dropping directory record");
                report.dropped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let event = enricher.enrich(self.source.as_ref(), event).await?;
        let event = match self.filter.evaluate(&event) {
            FilterDecision::Include => event,
            FilterDecision::Exclude(_) if event.is_delete() => event,
            FilterDecision::Exclude(reason) => {
                debug!(dn = %dn, uuid = %event.uuid(), reason = %reason, "Out of scope, deleting");
                report.tombstoned += 1;
                event.into_delete()
            }
        };

        let registration = match self.mapper.map(&event) {
            Ok(registration) => registration,
            Err(e) if e.is_mapping() => {
                warn!(dn = %dn, uuid = %event.uuid(), error = %e, "Dropping directory record");
                report.dropped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let entry = NewQueueEntry::new(self.cvr.clone(), event.operation(), registration)
            .with_priority(self.priority)
            .with_occurred_at(event.timestamp());
        self.queue.enqueue(entry).await?;
        report.enqueued += 1;
        Ok(())
    }
}
