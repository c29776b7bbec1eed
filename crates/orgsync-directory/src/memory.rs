//! In-memory directory for tests.
//!
//! Every write appends to a change log numbered like AD's uSNChanged; the
//! cursor is the last number handed out, as 8 big-endian bytes.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use orgsync_core::ObjectUuid;

use crate::ad::normalize_dn;
use crate::error::{DirectoryError, DirectoryResult};
use crate::record::{ChangePage, DirectoryRecord};
use crate::source::DirectorySource;

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, DirectoryRecord>,
    log: Vec<(u64, DirectoryRecord)>,
    usn: u64,
    unavailable: bool,
    changes_since_calls: Vec<Vec<u8>>,
    all_current_calls: usize,
}

/// Directory double backed by a change log.
#[derive(Debug)]
pub struct InMemoryDirectory {
    key: String,
    state: Mutex<State>,
}

fn encode_cursor(usn: u64) -> Vec<u8> {
    usn.to_be_bytes().to_vec()
}

fn decode_cursor(cursor: &[u8]) -> DirectoryResult<u64> {
    if cursor.is_empty() {
        return Ok(0);
    }
    let bytes: [u8; 8] = cursor
        .try_into()
        .map_err(|_| DirectoryError::invalid_cursor(format!("expected 8 bytes, got {}", cursor.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create or modify an object.
    pub fn upsert(&self, record: DirectoryRecord) {
        let mut state = self.lock();
        state.usn += 1;
        let usn = state.usn;
        state.objects.insert(normalize_dn(&record.dn), record.clone());
        state.log.push((usn, record));
    }

    /// Move an object to a new DN; reported as a modification.
    pub fn rename(&self, old_dn: &str, new_dn: &str) -> bool {
        let mut state = self.lock();
        let Some(mut record) = state.objects.remove(&normalize_dn(old_dn)) else {
            return false;
        };
        record.dn = new_dn.to_string();
        state.usn += 1;
        let usn = state.usn;
        state.objects.insert(normalize_dn(new_dn), record.clone());
        state.log.push((usn, record));
        true
    }

    /// Delete an object; reported as a tombstone carrying its last attributes.
    pub fn delete(&self, dn: &str) -> bool {
        let mut state = self.lock();
        let Some(record) = state.objects.remove(&normalize_dn(dn)) else {
            return false;
        };
        state.usn += 1;
        let usn = state.usn;
        state.log.push((usn, record.deleted()));
        true
    }

    /// Remove an object without any trace in the change log.
    pub fn forget(&self, dn: &str) -> bool {
        self.lock().objects.remove(&normalize_dn(dn)).is_some()
    }

    /// Make every call fail with an unavailable error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Cursors passed to `changes_since`, in call order.
    #[must_use]
    pub fn changes_since_calls(&self) -> Vec<Vec<u8>> {
        self.lock().changes_since_calls.clone()
    }

    /// Number of `all_current` calls.
    #[must_use]
    pub fn all_current_calls(&self) -> usize {
        self.lock().all_current_calls
    }

    /// Cursor for a given change number.
    #[must_use]
    pub fn cursor_at(usn: u64) -> Vec<u8> {
        encode_cursor(usn)
    }

    fn check_available(state: &State) -> DirectoryResult<()> {
        if state.unavailable {
            return Err(DirectoryError::unavailable("directory offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectorySource for InMemoryDirectory {
    fn source_key(&self) -> &str {
        &self.key
    }

    async fn changes_since(&self, cursor: &[u8], page_size: u32) -> DirectoryResult<ChangePage> {
        let mut state = self.lock();
        state.changes_since_calls.push(cursor.to_vec());
        Self::check_available(&state)?;

        let after = decode_cursor(cursor)?;
        let page_size = usize::try_from(page_size).unwrap_or(usize::MAX).max(1);
        let pending: Vec<&(u64, DirectoryRecord)> =
            state.log.iter().filter(|(usn, _)| *usn > after).collect();

        let page: Vec<&(u64, DirectoryRecord)> = pending.iter().take(page_size).copied().collect();
        let last = page.last().map_or(after, |(usn, _)| *usn);

        Ok(ChangePage {
            records: page.into_iter().map(|(_, record)| record.clone()).collect(),
            cursor: encode_cursor(last),
            has_more: pending.len() > page_size,
        })
    }

    async fn all_current(&self) -> DirectoryResult<Vec<DirectoryRecord>> {
        let mut state = self.lock();
        state.all_current_calls += 1;
        Self::check_available(&state)?;
        Ok(state.objects.values().cloned().collect())
    }

    async fn current_cursor(&self) -> DirectoryResult<Vec<u8>> {
        let state = self.lock();
        Self::check_available(&state)?;
        Ok(encode_cursor(state.usn))
    }

    async fn resolve_guid(&self, dn: &str) -> DirectoryResult<Option<ObjectUuid>> {
        let state = self.lock();
        Self::check_available(&state)?;
        Ok(state
            .objects
            .get(&normalize_dn(dn))
            .and_then(DirectoryRecord::object_guid))
    }
}
