//! Domain events built from raw directory records.

use chrono::{DateTime, Utc};
use orgsync_core::{EntityKind, ObjectUuid, OperationType};
use orgsync_directory::ad::OBJECT_GUID;
use orgsync_directory::{AttributeSet, DirectoryRecord};

use super::error::{SyncError, SyncResult};

/// An immutable change to one org unit or user.
///
/// Built by [`DomainEvent::from_record`]; enrichment and the filter produce
/// new events instead of mutating this one.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    operation: OperationType,
    kind: EntityKind,
    uuid: ObjectUuid,
    dn: String,
    attributes: AttributeSet,
    timestamp: DateTime<Utc>,
    parent_dn: Option<String>,
    parent_uuid: Option<ObjectUuid>,
    disabled: bool,
}

impl DomainEvent {
    /// Build an event from a directory record.
    ///
    /// Returns `Ok(None)` for records that are neither org units nor users.
    /// A record without an objectGUID cannot be identified and is a mapping
    /// error.
    pub fn from_record(record: DirectoryRecord, now: DateTime<Utc>) -> SyncResult<Option<Self>> {
        let Some(kind) = record.classify() else {
            return Ok(None);
        };
        let uuid = record
            .object_guid()
            .ok_or_else(|| SyncError::mapping(OBJECT_GUID, format!("missing on '{}'", record.dn)))?;

        let operation = if record.is_deleted {
            OperationType::Delete
        } else {
            OperationType::Update
        };
        let parent_dn = record.parent_dn();

        Ok(Some(Self {
            operation,
            kind,
            uuid,
            timestamp: record.when_changed.unwrap_or(now),
            dn: record.dn,
            attributes: record.attributes,
            parent_dn,
            parent_uuid: None,
            disabled: false,
        }))
    }

    #[must_use]
    pub fn operation(&self) -> OperationType {
        self.operation
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn uuid(&self) -> ObjectUuid {
        self.uuid
    }

    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    #[must_use]
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn parent_dn(&self) -> Option<&str> {
        self.parent_dn.as_deref()
    }

    /// objectGUID of the containing org unit, once enriched.
    #[must_use]
    pub fn parent_uuid(&self) -> Option<ObjectUuid> {
        self.parent_uuid
    }

    /// The account is disabled in the directory, once enriched.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.operation == OperationType::Delete
    }

    /// Event with derived values filled in.
    #[must_use]
    pub fn with_enrichment(self, parent_uuid: Option<ObjectUuid>, disabled: bool) -> Self {
        Self {
            parent_uuid,
            disabled,
            ..self
        }
    }

    /// Same object, operation forced to delete.
    #[must_use]
    pub fn into_delete(self) -> Self {
        Self {
            operation: OperationType::Delete,
            ..self
        }
    }
}
