//! Reconciliation pass.
//!
//! Compares everything the registry holds for a tenant with the in-scope
//! objects currently in the directory, and queues a deletion for every
//! registry object the directory no longer has. Deletions of nested objects
//! do not always show up in the change feed; this pass catches them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use orgsync_core::{Cvr, EntityKind, ObjectUuid, OperationType, Registration};
use orgsync_db::DEFAULT_PRIORITY;
use orgsync_directory::DirectorySource;
use orgsync_registry::RegistryClient;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::queue::OperationQueue;
use crate::sync::enrich::derive_disabled;
use crate::sync::{DomainEvent, Filter, SyncResult};

/// Reconciliation counts for one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReconciliation {
    pub kind: EntityKind,
    /// Objects the registry holds.
    pub registry: usize,
    /// In-scope objects in the directory.
    pub directory: usize,
    /// Deletions queued.
    pub deleted: usize,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub kinds: Vec<KindReconciliation>,
}

impl ReconciliationReport {
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.kinds.iter().map(|k| k.deleted).sum()
    }

    #[must_use]
    pub fn for_kind(&self, kind: EntityKind) -> Option<&KindReconciliation> {
        self.kinds.iter().find(|k| k.kind == kind)
    }
}

/// Queues deletions for registry objects missing from the directory.
pub struct Reconciler<R: RegistryClient, D: DirectorySource> {
    registry: Arc<R>,
    source: Arc<D>,
    queue: OperationQueue,
    filter: Filter,
    cvr: Cvr,
    priority: i32,
}

impl<R: RegistryClient, D: DirectorySource> Reconciler<R, D> {
    pub fn new(
        registry: Arc<R>,
        source: Arc<D>,
        queue: OperationQueue,
        filter: Filter,
        cvr: Cvr,
    ) -> Self {
        Self {
            registry,
            source,
            queue,
            filter,
            cvr,
            priority: DEFAULT_PRIORITY,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Run one reconciliation pass.
    #[instrument(skip(self), fields(cvr = %self.cvr))]
    pub async fn run_once(&self) -> SyncResult<ReconciliationReport> {
        let snapshot = self.directory_snapshot().await?;
        let mut report = ReconciliationReport::default();

        for kind in EntityKind::ALL {
            let registered = self.registry.list_uuids(&self.cvr, kind).await?;
            let present = snapshot.get(&kind);

            let mut missing: Vec<ObjectUuid> = registered
                .iter()
                .filter(|uuid| present.map_or(true, |p| !p.contains(*uuid)))
                .copied()
                .collect();
            missing.sort();

            for uuid in &missing {
                debug!(kind = %kind, uuid = %uuid, "Registry object missing from directory");
                self.queue
                    .save(
                        Registration::identity_only(kind, *uuid),
                        OperationType::Delete,
                        false,
                        self.priority,
                        &self.cvr,
                    )
                    .await?;
            }

            report.kinds.push(KindReconciliation {
                kind,
                registry: registered.len(),
                directory: present.map_or(0, HashSet::len),
                deleted: missing.len(),
            });
        }

        info!(deleted = report.deleted(), "Reconciliation finished");
        Ok(report)
    }

    /// In-scope object identities per kind.
    async fn directory_snapshot(&self) -> SyncResult<HashMap<EntityKind, HashSet<ObjectUuid>>> {
        let now = Utc::now();
        let mut snapshot: HashMap<EntityKind, HashSet<ObjectUuid>> = HashMap::new();

        for record in self.source.all_current().await? {
            let dn = record.dn.clone();
            let event = match DomainEvent::from_record(record, now) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    warn!(dn = %dn, error = %e, "Skipping unidentifiable directory record");
                    continue;
                }
            };

            let disabled = derive_disabled(&event);
            let event = event.with_enrichment(None, disabled);
            if self.filter.evaluate(&event).is_included() {
                snapshot.entry(event.kind()).or_default().insert(event.uuid());
            }
        }
        Ok(snapshot)
    }
}
