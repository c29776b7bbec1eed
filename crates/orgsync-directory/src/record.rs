//! Raw directory change records.

use chrono::{DateTime, Utc};
use orgsync_core::{EntityKind, ObjectUuid};
use serde::{Deserialize, Serialize};

use crate::ad;
use crate::attributes::AttributeSet;

/// One object as reported by the directory, live or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub dn: String,
    /// objectClass values, most general first.
    pub object_classes: Vec<String>,
    pub attributes: AttributeSet,
    /// The directory reported the object as deleted (tombstone).
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub when_changed: Option<DateTime<Utc>>,
}

impl DirectoryRecord {
    pub fn new(dn: impl Into<String>, object_classes: &[&str], attributes: AttributeSet) -> Self {
        Self {
            dn: dn.into(),
            object_classes: object_classes.iter().map(|c| (*c).to_string()).collect(),
            attributes,
            is_deleted: false,
            when_changed: None,
        }
    }

    /// Mark the record as a deletion.
    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    #[must_use]
    pub fn with_when_changed(mut self, when_changed: DateTime<Utc>) -> Self {
        self.when_changed = Some(when_changed);
        self
    }

    fn has_class(&self, class: &str) -> bool {
        self.object_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(class))
    }

    /// Entity kind of the record; `None` for anything that is neither an
    /// organisational unit nor a user account (groups, computers, contacts).
    #[must_use]
    pub fn classify(&self) -> Option<EntityKind> {
        if self.has_class("organizationalUnit") {
            Some(EntityKind::OrgUnit)
        } else if self.has_class("user") && !self.has_class("computer") {
            Some(EntityKind::User)
        } else {
            None
        }
    }

    /// Identity from objectGUID.
    #[must_use]
    pub fn object_guid(&self) -> Option<ObjectUuid> {
        ad::object_guid(&self.attributes)
    }

    /// DN of the containing object.
    #[must_use]
    pub fn parent_dn(&self) -> Option<String> {
        ad::parent_dn(&self.dn)
    }
}

/// One page of the change feed.
#[derive(Debug, Clone, Default)]
pub struct ChangePage {
    pub records: Vec<DirectoryRecord>,
    /// Cursor to resume after this page.
    pub cursor: Vec<u8>,
    /// More changes are available right away.
    pub has_more: bool,
}
