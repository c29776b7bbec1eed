//! # orgsync engine
//!
//! Durable retry queue and synchronization engine between upstream
//! organisational sources and the remote registry.
//!
//! ```text
//! ┌──────────────────┐   save    ┌────────────────┐  tick   ┌──────────────┐
//! │ Gateway          │──────────►│ OperationQueue │────────►│ SyncEngine   │
//! │ ChangeTracker    │           │  (SQLite)      │◄────────│  (drain)     │
//! │ Reconciler       │           └───────┬────────┘ complete└──────┬───────┘
//! └──────────────────┘                   │                         │
//!                                        ▼                         ▼
//!                              success / failure archive    RegistryClient
//! ```
//!
//! - [`queue::OperationQueue`]: per-kind queue ordered by priority, then
//!   insertion; entries leave it only through an archive.
//! - [`engine::SyncEngine`]: single-flight drain ticks with bounded
//!   concurrency and a 5/15/30 minute backoff on incomplete batches.
//! - [`sync::ChangeTracker`]: cursor-based directory change tracking.
//! - [`reconciliation::Reconciler`]: full-listing pass queueing deletions.
//! - [`service::SyncService`]: the tickers tying it together.

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod reconciliation;
pub mod service;
pub mod sync;

pub use backoff::BackoffState;
pub use config::{retention_from_days, ConfigError, EngineConfig, MAX_RETENTION_DAYS};
pub use engine::{DrainConfig, KindReport, KindStatus, SyncEngine, TickReport};
pub use error::{EngineError, EngineResult, QueueError, QueueResult};
pub use queue::{KindStats, OperationQueue, QueueStats};
pub use reconciliation::{KindReconciliation, ReconciliationReport, Reconciler};
pub use service::{ServiceIntervals, SyncService};
pub use sync::{
    ChangeTracker, CursorStore, DomainEvent, EventMapper, Filter, FilterConfig, FilterDecision,
    SyncError, SyncMode, SyncReport, SyncResult,
};
