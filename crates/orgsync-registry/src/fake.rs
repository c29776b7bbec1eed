//! In-memory registry for tests.
//!
//! Stores registrations per municipality and kind, and fails calls for
//! chosen uuids on demand: a number of transient failures followed by
//! success, or a permanent rejection on every call.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgsync_core::{Cvr, EntityKind, ObjectUuid, Registration};

use crate::client::{RegistryClient, WriteOutcome};
use crate::error::{RegistryError, RegistryResult};

/// Kind of call recorded by [`FakeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Update,
    Delete,
    Deactivate,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub call: CallKind,
    pub cvr: Cvr,
    pub kind: EntityKind,
    pub uuid: ObjectUuid,
    pub bypass_cache: bool,
}

#[derive(Debug, Clone)]
struct StoredObject {
    registration: Registration,
    active: bool,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<(Cvr, EntityKind), HashMap<ObjectUuid, StoredObject>>,
    transient_failures: HashMap<ObjectUuid, u32>,
    permanent_failures: HashMap<ObjectUuid, String>,
    calls: Vec<RecordedCall>,
    delay: Option<Duration>,
    listing_unavailable: bool,
}

/// Registry double with scripted failures.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
}

impl FakeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Poisoning is ignored; the state stays usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `times` calls for `uuid` with a retry-later error.
    pub fn fail_transiently(&self, uuid: ObjectUuid, times: u32) {
        self.lock().transient_failures.insert(uuid, times);
    }

    /// Reject every call for `uuid` with `message`.
    pub fn fail_permanently(&self, uuid: ObjectUuid, message: impl Into<String>) {
        self.lock().permanent_failures.insert(uuid, message.into());
    }

    /// Sleep for `delay` inside every write call.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Make `list_uuids` fail with an unavailable error.
    pub fn set_listing_unavailable(&self, unavailable: bool) {
        self.lock().listing_unavailable = unavailable;
    }

    /// Store an object without recording a call.
    pub fn seed(&self, cvr: &Cvr, registration: Registration) {
        let key = (cvr.clone(), registration.kind());
        self.lock().objects.entry(key).or_default().insert(
            registration.uuid(),
            StoredObject {
                registration,
                active: true,
            },
        );
    }

    /// Current registration for an object, if stored.
    #[must_use]
    pub fn get(&self, cvr: &Cvr, kind: EntityKind, uuid: ObjectUuid) -> Option<Registration> {
        self.lock()
            .objects
            .get(&(cvr.clone(), kind))
            .and_then(|objects| objects.get(&uuid))
            .map(|stored| stored.registration.clone())
    }

    /// Whether a stored object is active. `None` if not stored.
    #[must_use]
    pub fn is_active(&self, cvr: &Cvr, kind: EntityKind, uuid: ObjectUuid) -> Option<bool> {
        self.lock()
            .objects
            .get(&(cvr.clone(), kind))
            .and_then(|objects| objects.get(&uuid))
            .map(|stored| stored.active)
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of calls made for `uuid`, failed ones included.
    #[must_use]
    pub fn call_count(&self, uuid: ObjectUuid) -> usize {
        self.lock().calls.iter().filter(|c| c.uuid == uuid).count()
    }

    /// Record the call and apply any scripted failure for `uuid`.
    async fn begin(
        &self,
        call: CallKind,
        cvr: &Cvr,
        kind: EntityKind,
        uuid: ObjectUuid,
        bypass_cache: bool,
    ) -> RegistryResult<()> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                call,
                cvr: cvr.clone(),
                kind,
                uuid,
                bypass_cache,
            });
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(message) = state.permanent_failures.get(&uuid) {
            return Err(RegistryError::rejected(message.clone()));
        }
        if let Some(remaining) = state.transient_failures.get_mut(&uuid) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RegistryError::retry_later(format!("{uuid} is locked")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn update(
        &self,
        cvr: &Cvr,
        registration: &Registration,
        bypass_cache: bool,
    ) -> RegistryResult<WriteOutcome> {
        let kind = registration.kind();
        let uuid = registration.uuid();
        self.begin(CallKind::Update, cvr, kind, uuid, bypass_cache)
            .await?;

        let mut state = self.lock();
        let objects = state.objects.entry((cvr.clone(), kind)).or_default();
        let unchanged = objects
            .get(&uuid)
            .is_some_and(|stored| stored.active && stored.registration == *registration);
        if unchanged && !bypass_cache {
            return Ok(WriteOutcome::Skipped);
        }

        objects.insert(
            uuid,
            StoredObject {
                registration: registration.clone(),
                active: true,
            },
        );
        Ok(WriteOutcome::Applied)
    }

    async fn delete(
        &self,
        cvr: &Cvr,
        kind: EntityKind,
        uuid: ObjectUuid,
        _timestamp: DateTime<Utc>,
    ) -> RegistryResult<WriteOutcome> {
        self.begin(CallKind::Delete, cvr, kind, uuid, false).await?;

        let mut state = self.lock();
        let removed = state
            .objects
            .get_mut(&(cvr.clone(), kind))
            .and_then(|objects| objects.remove(&uuid));
        Ok(match removed {
            Some(_) => WriteOutcome::Applied,
            None => WriteOutcome::Skipped,
        })
    }

    async fn deactivate(
        &self,
        cvr: &Cvr,
        kind: EntityKind,
        uuid: ObjectUuid,
        _timestamp: DateTime<Utc>,
    ) -> RegistryResult<WriteOutcome> {
        self.begin(CallKind::Deactivate, cvr, kind, uuid, false)
            .await?;

        let mut state = self.lock();
        let stored = state
            .objects
            .get_mut(&(cvr.clone(), kind))
            .and_then(|objects| objects.get_mut(&uuid));
        match stored {
            Some(stored) if stored.active => {
                stored.active = false;
                Ok(WriteOutcome::Applied)
            }
            Some(_) => Ok(WriteOutcome::Skipped),
            None => Err(RegistryError::rejected(format!("{kind} {uuid} does not exist"))),
        }
    }

    async fn list_uuids(
        &self,
        cvr: &Cvr,
        kind: EntityKind,
    ) -> RegistryResult<HashSet<ObjectUuid>> {
        let state = self.lock();
        if state.listing_unavailable {
            return Err(RegistryError::unavailable("listing disabled"));
        }
        Ok(state
            .objects
            .get(&(cvr.clone(), kind))
            .map(|objects| objects.keys().copied().collect())
            .unwrap_or_default())
    }
}
