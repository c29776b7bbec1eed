//! Enumerations shared by the queue, the engine and the registry contract.

use serde::{Deserialize, Serialize};

/// The two kinds of entity kept in sync with the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Organisational unit (department, team).
    OrgUnit,
    /// Employee.
    User,
}

impl EntityKind {
    /// Drain order: org units first, since positions reference them.
    pub const ALL: [EntityKind; 2] = [EntityKind::OrgUnit, EntityKind::User];

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::OrgUnit => "orgunit",
            EntityKind::User => "user",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "orgunit" | "org_unit" | "ou" => Ok(EntityKind::OrgUnit),
            "user" => Ok(EntityKind::User),
            _ => Err(format!("Unknown entity kind: {s}")),
        }
    }
}

/// Operation requested against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Create or overwrite the object (idempotent upsert).
    Update,
    /// Remove the object.
    Delete,
    /// Keep the object but mark it inactive.
    Deactivate,
}

impl OperationType {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::Deactivate => "deactivate",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "update" => Ok(OperationType::Update),
            "delete" => Ok(OperationType::Delete),
            "deactivate" => Ok(OperationType::Deactivate),
            _ => Err(format!("Unknown operation type: {s}")),
        }
    }
}
