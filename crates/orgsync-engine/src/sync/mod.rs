//! Directory synchronization.
//!
//! Pipeline for one raw record:
//!
//! ```text
//! DirectoryRecord ─► DomainEvent ─► Enricher ─► Filter ─► EventMapper ─► OperationQueue
//!                    (classify)     (parent,    (out of     (registration)
//!                                    disabled)   scope ⇒ delete)
//! ```
//!
//! - [`tracker::ChangeTracker`] drives the pipeline from the directory's
//!   change feed and keeps the cursor in [`cursor::CursorStore`].
//! - [`crate::reconciliation::Reconciler`] compares full listings to catch
//!   deletions the change feed missed.

pub mod cursor;
pub mod enrich;
pub mod error;
pub mod event;
pub mod filter;
pub mod mapper;
pub mod tracker;

pub use cursor::CursorStore;
pub use enrich::Enricher;
pub use error::{SyncError, SyncResult};
pub use event::DomainEvent;
pub use filter::{ExclusionReason, Filter, FilterConfig, FilterDecision};
pub use mapper::EventMapper;
pub use tracker::{ChangeTracker, SyncMode, SyncReport};
