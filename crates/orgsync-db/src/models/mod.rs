//! Database models.
//!
//! Each entity kind has its own queue, child, success and failure tables;
//! [`tables`] maps a kind to those names. Timestamps are stored as unix
//! milliseconds so ordering and range deletes are plain integer compares.

pub mod archive_entry;
pub mod queue_entry;
pub mod sync_cursor;

use chrono::{DateTime, Utc};
use orgsync_core::EntityKind;

use crate::error::DbError;

pub use archive_entry::{ArchiveEntry, ArchiveOutcome, Resolution};
pub use queue_entry::{NewQueueEntry, QueueEntry};
pub use sync_cursor::SyncCursor;

/// Table names for one entity kind.
#[derive(Debug)]
pub(crate) struct KindTables {
    pub queue: &'static str,
    pub children: &'static str,
    pub success: &'static str,
    pub failure: &'static str,
}

const ORG_UNIT_TABLES: KindTables = KindTables {
    queue: "queue_orgunits",
    children: "queue_orgunit_children",
    success: "success_orgunits",
    failure: "failure_orgunits",
};

const USER_TABLES: KindTables = KindTables {
    queue: "queue_users",
    children: "queue_user_children",
    success: "success_users",
    failure: "failure_users",
};

pub(crate) fn tables(kind: EntityKind) -> &'static KindTables {
    match kind {
        EntityKind::OrgUnit => &ORG_UNIT_TABLES,
        EntityKind::User => &USER_TABLES,
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::invalid_row(format!("timestamp out of range: {millis}")))
}
