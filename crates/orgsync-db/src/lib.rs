//! orgsync database layer.
//!
//! SQLite persistence for the durable operation queue, its success and
//! failure archives, and directory change-feed cursors.
//!
//! # Example
//!
//! ```rust,ignore
//! use orgsync_db::{DbPool, run_migrations};
//!
//! let pool = DbPool::connect("sqlite://orgsync.db").await?;
//! run_migrations(&pool).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use models::queue_entry::DEFAULT_PRIORITY;
pub use models::{
    ArchiveEntry, ArchiveOutcome, NewQueueEntry, QueueEntry, Resolution, SyncCursor,
};
pub use pool::DbPool;
