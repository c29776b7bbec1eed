//! Registration payloads sent to the registry.
//!
//! A registration is the full desired state of one org unit or one user.
//! The registry treats an update as an upsert, so sending the same
//! registration twice is harmless.
//!
//! Multi-valued fields (positions, it-systems, contact places, tasks) are
//! listed in `CHILD_COLLECTIONS` so the storage layer can keep them in
//! child rows next to the aggregate.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ids::ObjectUuid;
use crate::types::EntityKind;

/// Type of organisational unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgUnitType {
    #[default]
    Department,
    Team,
}

/// A contact place: another unit that handles a set of tasks on behalf of
/// this unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPlace {
    pub org_unit_uuid: ObjectUuid,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Desired state of an organisational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnitRegistration {
    pub uuid: ObjectUuid,
    #[serde(default)]
    pub name: String,
    /// `None` for the root unit.
    #[serde(default)]
    pub parent_uuid: Option<ObjectUuid>,
    #[serde(default)]
    pub short_key: Option<String>,
    #[serde(default)]
    pub org_unit_type: OrgUnitType,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ean: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub los_short_name: Option<String>,
    #[serde(default)]
    pub it_systems: Vec<ObjectUuid>,
    #[serde(default)]
    pub contact_places: Vec<ContactPlace>,
    /// Task classification codes (KLE).
    #[serde(default)]
    pub tasks: Vec<String>,
}

impl OrgUnitRegistration {
    /// Fields stored as child rows.
    pub const CHILD_COLLECTIONS: &'static [&'static str] =
        &["it_systems", "contact_places", "tasks"];

    /// Create a registration with a uuid and a name; everything else empty.
    pub fn new(uuid: ObjectUuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            parent_uuid: None,
            short_key: None,
            org_unit_type: OrgUnitType::Department,
            email: None,
            phone: None,
            ean: None,
            location: None,
            url: None,
            los_short_name: None,
            it_systems: Vec::new(),
            contact_places: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Set the parent unit.
    #[must_use]
    pub fn with_parent(mut self, parent_uuid: ObjectUuid) -> Self {
        self.parent_uuid = Some(parent_uuid);
        self
    }
}

/// The person behind a user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cpr: Option<String>,
}

/// A user's position (job) in an org unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    pub org_unit_uuid: ObjectUuid,
    #[serde(default)]
    pub short_key: Option<String>,
}

/// Desired state of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistration {
    pub uuid: ObjectUuid,
    /// Login name.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub short_key: Option<String>,
    #[serde(default)]
    pub person: Person,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

impl UserRegistration {
    /// Fields stored as child rows.
    pub const CHILD_COLLECTIONS: &'static [&'static str] = &["positions"];

    /// Create a registration with a uuid and a login name; everything else empty.
    pub fn new(uuid: ObjectUuid, user_id: impl Into<String>) -> Self {
        Self {
            uuid,
            user_id: user_id.into(),
            short_key: None,
            person: Person::default(),
            email: None,
            phone: None,
            location: None,
            positions: Vec::new(),
        }
    }

    /// Add a position.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }
}

/// A registration of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Registration {
    OrgUnit(OrgUnitRegistration),
    User(UserRegistration),
}

impl Registration {
    /// Registration carrying only the identity, used for deletions where the
    /// source no longer has any attributes.
    #[must_use]
    pub fn identity_only(kind: EntityKind, uuid: ObjectUuid) -> Self {
        match kind {
            EntityKind::OrgUnit => Registration::OrgUnit(OrgUnitRegistration::new(uuid, "")),
            EntityKind::User => Registration::User(UserRegistration::new(uuid, "")),
        }
    }

    /// Entity kind of this registration.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Registration::OrgUnit(_) => EntityKind::OrgUnit,
            Registration::User(_) => EntityKind::User,
        }
    }

    /// Identity of the registered object.
    #[must_use]
    pub fn uuid(&self) -> ObjectUuid {
        match self {
            Registration::OrgUnit(ou) => ou.uuid,
            Registration::User(user) => user.uuid,
        }
    }

    /// Names of the fields stored as child rows for a kind.
    #[must_use]
    pub fn child_collections(kind: EntityKind) -> &'static [&'static str] {
        match kind {
            EntityKind::OrgUnit => OrgUnitRegistration::CHILD_COLLECTIONS,
            EntityKind::User => UserRegistration::CHILD_COLLECTIONS,
        }
    }

    /// Serialize the inner payload (without the kind tag) to a JSON object.
    pub fn to_value(&self) -> CoreResult<serde_json::Value> {
        let value = match self {
            Registration::OrgUnit(ou) => serde_json::to_value(ou)?,
            Registration::User(user) => serde_json::to_value(user)?,
        };
        Ok(value)
    }

    /// Rebuild a registration of `kind` from its JSON payload.
    pub fn from_value(kind: EntityKind, value: serde_json::Value) -> CoreResult<Self> {
        if !value.is_object() {
            return Err(CoreError::payload(kind, "payload is not a JSON object"));
        }
        let registration = match kind {
            EntityKind::OrgUnit => Registration::OrgUnit(serde_json::from_value(value)?),
            EntityKind::User => Registration::User(serde_json::from_value(value)?),
        };
        Ok(registration)
    }
}

impl From<OrgUnitRegistration> for Registration {
    fn from(ou: OrgUnitRegistration) -> Self {
        Registration::OrgUnit(ou)
    }
}

impl From<UserRegistration> for Registration {
    fn from(user: UserRegistration) -> Self {
        Registration::User(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uuid(s: &str) -> ObjectUuid {
        s.parse().unwrap()
    }

    #[test]
    fn test_kind_and_uuid() {
        let id = uuid("11111111-1111-1111-1111-111111111111");
        let reg: Registration = OrgUnitRegistration::new(id, "IT").into();
        assert_eq!(reg.kind(), EntityKind::OrgUnit);
        assert_eq!(reg.uuid(), id);

        let reg: Registration = UserRegistration::new(id, "jdoe").into();
        assert_eq!(reg.kind(), EntityKind::User);
    }

    #[test]
    fn test_payload_value_has_no_kind_tag() {
        let reg: Registration =
            OrgUnitRegistration::new(uuid("11111111-1111-1111-1111-111111111111"), "IT").into();
        let value = reg.to_value().unwrap();
        assert!(value.get("kind").is_none());
        assert_eq!(value["name"], "IT");
        assert_eq!(value["tasks"], json!([]));
    }

    #[test]
    fn test_from_value_tolerates_missing_optional_fields() {
        let value = json!({
            "uuid": "22222222-2222-2222-2222-222222222222",
            "user_id": "jdoe",
            "positions": [
                {"name": "Developer", "org_unit_uuid": "33333333-3333-3333-3333-333333333333"}
            ]
        });
        let reg = Registration::from_value(EntityKind::User, value).unwrap();
        let Registration::User(user) = reg else {
            panic!("expected a user registration");
        };
        assert_eq!(user.user_id, "jdoe");
        assert_eq!(user.email, None);
        assert_eq!(user.positions.len(), 1);
        assert_eq!(user.positions[0].short_key, None);
    }

    #[test]
    fn test_from_value_normalizes_uuid_case() {
        let value = json!({
            "uuid": "AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA",
            "name": "Root",
            "parent_uuid": null
        });
        let reg = Registration::from_value(EntityKind::OrgUnit, value).unwrap();
        assert_eq!(reg.uuid().to_string(), "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa");
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let err = Registration::from_value(EntityKind::User, json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("user"));
    }

    #[test]
    fn test_identity_only_registration() {
        let id = uuid("44444444-4444-4444-4444-444444444444");
        let reg = Registration::identity_only(EntityKind::User, id);
        assert_eq!(reg.uuid(), id);
        assert_eq!(reg.kind(), EntityKind::User);
    }

    #[test]
    fn test_child_collections_per_kind() {
        assert_eq!(
            Registration::child_collections(EntityKind::User),
            &["positions"]
        );
        assert!(Registration::child_collections(EntityKind::OrgUnit).contains(&"contact_places"));
    }
}
