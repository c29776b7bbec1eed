//! Active Directory helpers.
//!
//! - objectGUID decoding to [`ObjectUuid`]
//! - userAccountControl flag parsing
//! - distinguished name helpers (parent DN, subtree containment)

use base64::Engine;
use orgsync_core::ObjectUuid;
use uuid::Uuid;

use crate::attributes::{AttributeSet, AttributeValue};

/// Attribute holding the immutable object identity.
pub const OBJECT_GUID: &str = "objectGUID";

/// Attribute holding account flags.
pub const USER_ACCOUNT_CONTROL: &str = "userAccountControl";

/// Decode an objectGUID attribute.
///
/// AD returns the GUID as 16 bytes with the first three fields
/// little-endian. Some gateways deliver it as text instead, either in the
/// usual hyphenated form or base64-encoded.
#[must_use]
pub fn object_guid(attributes: &AttributeSet) -> Option<ObjectUuid> {
    match attributes.get(OBJECT_GUID)? {
        AttributeValue::Binary(bytes) => guid_from_bytes(bytes),
        AttributeValue::String(s) => {
            let s = s.trim();
            if let Ok(uuid) = s.parse::<ObjectUuid>() {
                return Some(uuid);
            }
            let bytes = base64::engine::general_purpose::STANDARD.decode(s).ok()?;
            guid_from_bytes(&bytes)
        }
        _ => None,
    }
}

fn guid_from_bytes(bytes: &[u8]) -> Option<ObjectUuid> {
    let bytes: [u8; 16] = bytes.try_into().ok()?;
    Some(ObjectUuid::from_uuid(Uuid::from_bytes_le(bytes)))
}

/// Encode a uuid the way AD stores objectGUID.
#[must_use]
pub fn guid_to_bytes(uuid: ObjectUuid) -> Vec<u8> {
    uuid.as_uuid().to_bytes_le().to_vec()
}

/// userAccountControl bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAccountControl {
    pub value: u32,
}

impl UserAccountControl {
    pub const ACCOUNTDISABLE: u32 = 0x0002;
    pub const LOCKOUT: u32 = 0x0010;
    pub const NORMAL_ACCOUNT: u32 = 0x0200;
    pub const DONT_EXPIRE_PASSWORD: u32 = 0x1_0000;

    #[must_use]
    pub fn from_value(value: u32) -> Self {
        Self { value }
    }

    /// Read the flags from an entry. Missing or unparseable means `None`.
    #[must_use]
    pub fn from_attributes(attributes: &AttributeSet) -> Option<Self> {
        let raw = attributes.get(USER_ACCOUNT_CONTROL)?.as_integer()?;
        u32::try_from(raw).ok().map(Self::from_value)
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.value & Self::ACCOUNTDISABLE != 0
    }

    /// Active unless disabled. A locked-out account is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_disabled()
    }
}

impl From<UserAccountControl> for u32 {
    fn from(uac: UserAccountControl) -> Self {
        uac.value
    }
}

/// Split a DN into its RDN components, honouring `\,` escapes.
fn split_rdns(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                parts.push(dn[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(dn[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Lower-cased DN with whitespace around separators removed, for comparison.
#[must_use]
pub fn normalize_dn(dn: &str) -> String {
    split_rdns(dn)
        .into_iter()
        .map(|rdn| match rdn.split_once('=') {
            Some((attr, value)) => format!("{}={}", attr.trim(), value.trim()),
            None => rdn.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
        .to_lowercase()
}

/// The DN of the containing object, or `None` for a single-RDN DN.
#[must_use]
pub fn parent_dn(dn: &str) -> Option<String> {
    let rdns = split_rdns(dn);
    if rdns.len() < 2 {
        return None;
    }
    Some(rdns[1..].join(","))
}

/// True if `dn` is `base` or lies underneath it. Case-insensitive.
#[must_use]
pub fn is_within(dn: &str, base: &str) -> bool {
    let dn = normalize_dn(dn);
    let base = normalize_dn(base);
    if base.is_empty() {
        return true;
    }
    dn == base || dn.ends_with(&format!(",{base}"))
}
