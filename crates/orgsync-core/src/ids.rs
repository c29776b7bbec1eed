//! Strongly Typed Identifiers
//!
//! Newtypes for the two identifiers that flow through every queue row and
//! registry call:
//!
//! - [`Cvr`] - the municipality (tenant) identifier
//! - [`ObjectUuid`] - the canonical identity of an org unit or user
//!
//! # Example
//!
//! ```
//! use orgsync_core::{Cvr, ObjectUuid};
//!
//! let cvr: Cvr = "29189846".parse().unwrap();
//! let uuid: ObjectUuid = "0F1E2D3C-4B5A-6978-8796-A5B4C3D2E1F0".parse().unwrap();
//!
//! assert_eq!(cvr.as_str(), "29189846");
//! assert_eq!(uuid.to_string(), "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// Description of the parse failure
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Municipality identifier (CVR number) scoping every queue entry and
/// registry call.
///
/// A CVR is exactly eight ASCII digits. Surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cvr(String);

impl Cvr {
    /// Length of a CVR number.
    pub const LEN: usize = 8;

    /// Returns the CVR as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cvr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cvr {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != Self::LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseIdError {
                id_type: "Cvr",
                message: format!("expected {} digits, got '{trimmed}'", Self::LEN),
            });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for Cvr {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cvr> for String {
    fn from(cvr: Cvr) -> Self {
        cvr.0
    }
}

/// Canonical identity of an org unit or user.
///
/// Parsing accepts any case as well as braced (`{...}`) and simple
/// (no hyphens) forms; the value always renders as lower-case hyphenated
/// text, which is the form stored and compared everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectUuid(Uuid);

impl ObjectUuid {
    /// Creates a new random identity (v4).
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identity from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns a reference to the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for ObjectUuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ObjectUuid {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ParseIdError {
                id_type: "ObjectUuid",
                message: e.to_string(),
            })
    }
}

impl TryFrom<String> for ObjectUuid {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectUuid> for String {
    fn from(uuid: ObjectUuid) -> Self {
        uuid.to_string()
    }
}

impl From<Uuid> for ObjectUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
