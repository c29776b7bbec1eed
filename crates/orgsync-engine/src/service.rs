//! Sync Service
//!
//! Long-running process surface: four tickers driving the drain engine, the
//! directory tracker, the reconciliation pass and success-archive retention.
//! Every job has its own loop and the loops run concurrently, so a slow drain
//! does not hold back directory sync. A job never overlaps itself: ticks
//! missed while it runs are skipped rather than queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orgsync_directory::DirectorySource;
use orgsync_registry::RegistryClient;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::engine::SyncEngine;
use crate::queue::OperationQueue;
use crate::reconciliation::Reconciler;
use crate::sync::ChangeTracker;

/// Ticker periods.
#[derive(Debug, Clone)]
pub struct ServiceIntervals {
    pub drain: Duration,
    pub directory_sync: Duration,
    pub reconcile: Duration,
    pub cleanup: Duration,
}

impl Default for ServiceIntervals {
    fn default() -> Self {
        Self {
            drain: Duration::from_secs(60),
            directory_sync: Duration::from_secs(300),
            reconcile: Duration::from_secs(86_400),
            cleanup: Duration::from_secs(3_600),
        }
    }
}

impl From<&EngineConfig> for ServiceIntervals {
    fn from(config: &EngineConfig) -> Self {
        Self {
            drain: config.drain_interval,
            directory_sync: config.directory_sync_interval,
            reconcile: config.reconcile_interval,
            cleanup: config.cleanup_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Drain,
    DirectorySync,
    Reconcile,
    Cleanup,
}

/// Runs the periodic jobs until shut down.
pub struct SyncService<R: RegistryClient, D: DirectorySource> {
    engine: Arc<SyncEngine<R>>,
    tracker: Option<ChangeTracker<D>>,
    reconciler: Option<Reconciler<R, D>>,
    queue: OperationQueue,
    intervals: ServiceIntervals,
    retention: chrono::Duration,
    shutdown: watch::Sender<bool>,
}

impl<R: RegistryClient + 'static, D: DirectorySource> SyncService<R, D> {
    /// Service draining the queue and purging the success archive. Directory
    /// jobs are added with [`Self::with_tracker`] and
    /// [`Self::with_reconciler`].
    pub fn new(
        engine: Arc<SyncEngine<R>>,
        intervals: ServiceIntervals,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            queue: engine.queue().clone(),
            engine,
            tracker: None,
            reconciler: None,
            intervals,
            retention,
            shutdown: watch::channel(false).0,
        }
    }

    #[must_use]
    pub fn with_tracker(mut self, tracker: ChangeTracker<D>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    #[must_use]
    pub fn with_reconciler(mut self, reconciler: Reconciler<R, D>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Run until [`Self::shutdown`] is called.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            drain_secs = self.intervals.drain.as_secs(),
            directory_sync_secs = self.intervals.directory_sync.as_secs(),
            reconcile_secs = self.intervals.reconcile.as_secs(),
            cleanup_secs = self.intervals.cleanup.as_secs(),
            tracker = self.tracker.is_some(),
            reconciler = self.reconciler.is_some(),
            "Starting sync service"
        );

        tokio::join!(
            self.every(Job::Drain, self.intervals.drain),
            self.every(Job::DirectorySync, self.intervals.directory_sync),
            self.every(Job::Reconcile, self.intervals.reconcile),
            self.every(Job::Cleanup, self.intervals.cleanup),
        );

        info!("Sync service stopped");
    }

    /// Request graceful shutdown. Jobs in progress finish first.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.send_replace(true);
    }

    /// Check if shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn every(&self, job: Job, period: Duration) {
        let enabled = match job {
            Job::DirectorySync => self.tracker.is_some(),
            Job::Reconcile => self.reconciler.is_some(),
            Job::Drain | Job::Cleanup => true,
        };
        if !enabled {
            return;
        }

        let mut stop = self.shutdown.subscribe();
        let mut ticker = ticker(period);
        while !*stop.borrow_and_update() {
            tokio::select! {
                _ = stop.changed() => {}
                _ = ticker.tick() => match job {
                    Job::Drain => self.drain().await,
                    Job::DirectorySync => self.sync_directory().await,
                    Job::Reconcile => self.reconcile().await,
                    Job::Cleanup => self.cleanup().await,
                },
            }
        }
        debug!(job = ?job, "Job loop stopped");
    }

    async fn drain(&self) {
        if let Err(e) = self.engine.tick().await {
            if e.is_already_running() {
                debug!("Drain tick suppressed");
            } else {
                error!(error = %e, "Drain tick failed");
            }
        }
    }

    async fn sync_directory(&self) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        if let Err(e) = tracker.run_once().await {
            if e.is_retryable() {
                warn!(error = %e, "Directory sync failed, retrying next tick");
            } else {
                error!(error = %e, "Directory sync failed");
            }
        }
    }

    async fn reconcile(&self) {
        let Some(reconciler) = &self.reconciler else {
            return;
        };
        if let Err(e) = reconciler.run_once().await {
            error!(error = %e, "Reconciliation failed");
        }
    }

    async fn cleanup(&self) {
        match self.queue.retention_cleanup(Utc::now(), self.retention).await {
            Ok(count) if count > 0 => {
                info!(count = count, "Cleaned up success archive");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Failed to clean up success archive");
            }
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
