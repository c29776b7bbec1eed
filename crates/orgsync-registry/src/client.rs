//! Registry client contract.
//!
//! The registry's wire protocol and token handshake live behind this trait.
//! Every call carries the municipality explicitly; implementations must not
//! rely on any ambient tenant state.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgsync_core::{Cvr, EntityKind, ObjectUuid, Registration};
use serde::{Deserialize, Serialize};

use crate::error::RegistryResult;

/// What a successful write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOutcome {
    /// The registry state changed.
    Applied,
    /// The registry already had this state.
    Skipped,
}

impl WriteOutcome {
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, WriteOutcome::Skipped)
    }
}

/// Client for the remote organisational registry.
///
/// `update` is an idempotent upsert, so delivering the same registration
/// more than once is safe.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Create or overwrite an object.
    ///
    /// `bypass_cache` asks the client to write even if it believes the
    /// registry already holds this state.
    async fn update(
        &self,
        cvr: &Cvr,
        registration: &Registration,
        bypass_cache: bool,
    ) -> RegistryResult<WriteOutcome>;

    /// Remove an object.
    async fn delete(
        &self,
        cvr: &Cvr,
        kind: EntityKind,
        uuid: ObjectUuid,
        timestamp: DateTime<Utc>,
    ) -> RegistryResult<WriteOutcome>;

    /// Mark an object inactive without removing it.
    async fn deactivate(
        &self,
        cvr: &Cvr,
        kind: EntityKind,
        uuid: ObjectUuid,
        timestamp: DateTime<Utc>,
    ) -> RegistryResult<WriteOutcome>;

    /// Every object of `kind` the registry currently holds for `cvr`.
    async fn list_uuids(&self, cvr: &Cvr, kind: EntityKind)
        -> RegistryResult<HashSet<ObjectUuid>>;
}
