//! Event to registration mapping.
//!
//! Active Directory attributes used:
//!
//! | Registration field        | Attribute                          |
//! |---------------------------|------------------------------------|
//! | org unit name             | `ou`, then `name` (required)       |
//! | org unit email / phone    | `mail` / `telephoneNumber`         |
//! | org unit location / url   | `street` / `wWWHomePage`           |
//! | user id                   | `sAMAccountName` (required)        |
//! | person name               | `displayName`, `cn`, `givenName sn` (required) |
//! | user short key            | `employeeNumber`                   |
//! | user email / phone        | `mail` / `telephoneNumber`         |
//! | user location             | `physicalDeliveryOfficeName`       |
//! | position name             | `title`                            |
//!
//! A user's single position is held in the org unit containing the account.

use orgsync_core::{EntityKind, OrgUnitRegistration, Position, Registration, UserRegistration};
use orgsync_directory::AttributeSet;

use super::error::{SyncError, SyncResult};
use super::event::DomainEvent;

/// Position name used when the account has no title.
pub const DEFAULT_POSITION_NAME: &str = "Employee";

/// Maps domain events to registry payloads.
#[derive(Debug, Clone)]
pub struct EventMapper {
    default_position_name: String,
}

impl Default for EventMapper {
    fn default() -> Self {
        Self {
            default_position_name: DEFAULT_POSITION_NAME.to_string(),
        }
    }
}

impl EventMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_position_name(mut self, name: impl Into<String>) -> Self {
        self.default_position_name = name.into();
        self
    }

    /// Build the registration for an event.
    ///
    /// Deletions carry only the identity. Updates fail with
    /// [`SyncError::Mapping`] when a required attribute is missing.
    pub fn map(&self, event: &DomainEvent) -> SyncResult<Registration> {
        if event.is_delete() {
            return Ok(Registration::identity_only(event.kind(), event.uuid()));
        }
        match event.kind() {
            EntityKind::OrgUnit => Ok(map_org_unit(event)?.into()),
            EntityKind::User => Ok(self.map_user(event)?.into()),
        }
    }

    fn map_user(&self, event: &DomainEvent) -> SyncResult<UserRegistration> {
        let attrs = event.attributes();
        let user_id = attrs
            .get_string("sAMAccountName")
            .ok_or_else(|| SyncError::mapping("sAMAccountName", "required attribute missing"))?;
        let name = person_name(attrs)
            .ok_or_else(|| SyncError::mapping("displayName", "no displayName, cn or givenName/sn"))?;
        let org_unit_uuid = event.parent_uuid().ok_or_else(|| {
            SyncError::mapping(
                "distinguishedName",
                format!("'{}' is not inside a synchronized org unit", event.dn()),
            )
        })?;

        let mut user = UserRegistration::new(event.uuid(), user_id);
        user.person.name = name;
        user.short_key = owned(attrs, "employeeNumber");
        user.email = owned(attrs, "mail");
        user.phone = owned(attrs, "telephoneNumber");
        user.location = owned(attrs, "physicalDeliveryOfficeName");

        Ok(user.with_position(Position {
            name: owned(attrs, "title").unwrap_or_else(|| self.default_position_name.clone()),
            org_unit_uuid,
            short_key: None,
        }))
    }
}

fn map_org_unit(event: &DomainEvent) -> SyncResult<OrgUnitRegistration> {
    let attrs = event.attributes();
    let name = attrs
        .get_string("ou")
        .or_else(|| attrs.get_string("name"))
        .ok_or_else(|| SyncError::mapping("ou", "required attribute missing"))?;

    let mut unit = OrgUnitRegistration::new(event.uuid(), name);
    unit.parent_uuid = event.parent_uuid();
    unit.email = owned(attrs, "mail");
    unit.phone = owned(attrs, "telephoneNumber");
    unit.location = owned(attrs, "street");
    unit.url = owned(attrs, "wWWHomePage");
    Ok(unit)
}

fn person_name(attrs: &AttributeSet) -> Option<String> {
    if let Some(name) = attrs.get_string("displayName").or_else(|| attrs.get_string("cn")) {
        return Some(name.to_string());
    }
    let parts: Vec<&str> = [attrs.get_string("givenName"), attrs.get_string("sn")]
        .into_iter()
        .flatten()
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn owned(attrs: &AttributeSet, name: &str) -> Option<String> {
    attrs.get_string(name).map(str::to_string)
}
