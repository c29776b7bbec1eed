//! Directory source contract.

use async_trait::async_trait;
use orgsync_core::ObjectUuid;

use crate::error::DirectoryResult;
use crate::record::{ChangePage, DirectoryRecord};

/// A directory exposing a cursor-based change feed.
///
/// Cursors are opaque bytes produced by the source itself; callers only
/// store them and hand them back.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Stable key identifying this source, used to store its cursor.
    fn source_key(&self) -> &str;

    /// Up to `page_size` changes made after `cursor`, plus the cursor to
    /// resume from.
    async fn changes_since(&self, cursor: &[u8], page_size: u32) -> DirectoryResult<ChangePage>;

    /// Every object currently in the directory (no tombstones).
    async fn all_current(&self) -> DirectoryResult<Vec<DirectoryRecord>>;

    /// Cursor pointing at the current end of the change feed.
    async fn current_cursor(&self) -> DirectoryResult<Vec<u8>>;

    /// objectGUID of the object at `dn`, if it exists.
    async fn resolve_guid(&self, dn: &str) -> DirectoryResult<Option<ObjectUuid>>;
}
