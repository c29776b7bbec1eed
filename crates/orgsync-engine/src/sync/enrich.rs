//! Event enrichment.
//!
//! Resolves the objectGUID of the containing org unit and derives the
//! disabled flag from userAccountControl. Parent lookups are cached for the
//! lifetime of one [`Enricher`], which the tracker creates per run.

use std::collections::HashMap;

use orgsync_core::{EntityKind, ObjectUuid};
use orgsync_directory::ad::{self, UserAccountControl};
use orgsync_directory::DirectorySource;
use tracing::debug;

use super::error::SyncResult;
use super::event::DomainEvent;

/// Whether the event describes a disabled user account.
#[must_use]
pub fn derive_disabled(event: &DomainEvent) -> bool {
    event.kind() == EntityKind::User
        && UserAccountControl::from_attributes(event.attributes())
            .is_some_and(|uac| uac.is_disabled())
}

/// Fills in parent identity and derived flags.
#[derive(Debug, Default)]
pub struct Enricher {
    root_dn: Option<String>,
    cache: HashMap<String, Option<ObjectUuid>>,
}

impl Enricher {
    /// Parents outside `root_dn` are not resolved; the object is then a root
    /// of the synchronized tree.
    #[must_use]
    pub fn new(root_dn: Option<String>) -> Self {
        Self {
            root_dn,
            cache: HashMap::new(),
        }
    }

    /// Number of cached parent lookups.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Enrich an event. Delete events are returned unchanged.
    pub async fn enrich<D: DirectorySource + ?Sized>(
        &mut self,
        source: &D,
        event: DomainEvent,
    ) -> SyncResult<DomainEvent> {
        if event.is_delete() {
            return Ok(event);
        }

        let parent_uuid = match event.parent_dn() {
            Some(parent_dn) if self.in_scope(parent_dn) => {
                self.resolve_parent(source, parent_dn).await?
            }
            _ => None,
        };
        let disabled = derive_disabled(&event);
        Ok(event.with_enrichment(parent_uuid, disabled))
    }

    fn in_scope(&self, dn: &str) -> bool {
        self.root_dn
            .as_deref()
            .map_or(true, |root| ad::is_within(dn, root))
    }

    async fn resolve_parent<D: DirectorySource + ?Sized>(
        &mut self,
        source: &D,
        parent_dn: &str,
    ) -> SyncResult<Option<ObjectUuid>> {
        let key = ad::normalize_dn(parent_dn);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(*cached);
        }

        let resolved = source.resolve_guid(parent_dn).await?;
        if resolved.is_none() {
            debug!(parent_dn, "Parent not found in directory");
        }
        self.cache.insert(key, resolved);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orgsync_directory::ad::{guid_to_bytes, OBJECT_GUID, USER_ACCOUNT_CONTROL};
    use orgsync_directory::{AttributeSet, DirectoryRecord, InMemoryDirectory};

    const ROOT: &str = "OU=Kommune,DC=k,DC=dk";

    fn uuid(n: u8) -> ObjectUuid {
        format!("00000000-0000-0000-0000-0000000000{n:02x}")
            .parse()
            .unwrap()
    }

    fn ou(dn: &str, id: ObjectUuid) -> DirectoryRecord {
        DirectoryRecord::new(
            dn,
            &["top", "organizationalUnit"],
            AttributeSet::new().with(OBJECT_GUID, guid_to_bytes(id)),
        )
    }

    fn user(dn: &str, id: ObjectUuid, uac: i64) -> DirectoryRecord {
        DirectoryRecord::new(
            dn,
            &["top", "person", "user"],
            AttributeSet::new()
                .with(OBJECT_GUID, guid_to_bytes(id))
                .with(USER_ACCOUNT_CONTROL, uac),
        )
    }

    fn event(record: DirectoryRecord) -> DomainEvent {
        DomainEvent::from_record(record, Utc::now()).unwrap().unwrap()
    }

    fn directory() -> InMemoryDirectory {
        let directory = InMemoryDirectory::new("ad");
        directory.upsert(ou(ROOT, uuid(1)));
        directory.upsert(ou(&format!("OU=IT,{ROOT}"), uuid(2)));
        directory
    }

    #[tokio::test]
    async fn test_resolves_parent_and_caches() {
        let directory = directory();
        let mut enricher = Enricher::new(Some(ROOT.to_string()));

        let first = enricher
            .enrich(&directory, event(user(&format!("CN=A,OU=IT,{ROOT}"), uuid(10), 512)))
            .await
            .unwrap();
        let second = enricher
            .enrich(&directory, event(user(&format!("CN=B,ou=it,{ROOT}"), uuid(11), 512)))
            .await
            .unwrap();

        assert_eq!(first.parent_uuid(), Some(uuid(2)));
        assert_eq!(second.parent_uuid(), Some(uuid(2)));
        assert_eq!(enricher.cached(), 1);
        assert!(!first.is_disabled());
    }

    #[tokio::test]
    async fn test_root_unit_has_no_parent() {
        let directory = directory();
        let mut enricher = Enricher::new(Some(ROOT.to_string()));
        let root = enricher.enrich(&directory, event(ou(ROOT, uuid(1)))).await.unwrap();
        assert!(root.parent_uuid().is_none());
        assert_eq!(enricher.cached(), 0);
    }

    #[tokio::test]
    async fn test_disabled_flag() {
        let directory = directory();
        let mut enricher = Enricher::new(None);
        let disabled = enricher
            .enrich(&directory, event(user(&format!("CN=A,OU=IT,{ROOT}"), uuid(10), 514)))
            .await
            .unwrap();
        assert!(disabled.is_disabled());
    }

    #[tokio::test]
    async fn test_delete_is_untouched() {
        let directory = directory();
        let mut enricher = Enricher::new(None);
        let deleted = event(user(&format!("CN=A,OU=IT,{ROOT}"), uuid(10), 514).deleted());
        let enriched = enricher.enrich(&directory, deleted.clone()).await.unwrap();
        assert_eq!(enriched, deleted);
        assert_eq!(enricher.cached(), 0);
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let directory = directory();
        directory.set_unavailable(true);
        let mut enricher = Enricher::new(None);
        let result = enricher
            .enrich(&directory, event(user(&format!("CN=A,OU=IT,{ROOT}"), uuid(10), 512)))
            .await;
        assert!(result.unwrap_err().is_retryable());
    }
}
