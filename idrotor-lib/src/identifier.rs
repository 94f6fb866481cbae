//! Device identifier value type and its canonical format validator.
//!
//! The canonical shape is the one `UIDevice.identifierForVendor.uuidString`
//! produces: 36 characters, five groups of 8-4-4-4-12 uppercase hex digits
//! joined by `-`.

use crate::{IdRotorError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of a canonical identifier string.
pub const IDENTIFIER_LEN: usize = 36;

/// Hex digit counts of the hyphen-separated groups.
pub const GROUP_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];

/// Values callers have historically special-cased as "unset".
pub const RESERVED: [Uuid; 2] = [Uuid::nil(), Uuid::from_u128(u128::MAX)];

/// Check that `value` has the canonical shape.
///
/// Lowercase hex is rejected; the platform only ever reports uppercase.
pub fn is_canonical(value: &str) -> bool {
    if value.len() != IDENTIFIER_LEN {
        return false;
    }
    let mut groups = value.split('-');
    for expected in GROUP_LENGTHS {
        match groups.next() {
            Some(group) if group.len() == expected => {
                if !group
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
                {
                    return false;
                }
            }
            _ => return false,
        }
    }
    groups.next().is_none()
}

/// Check whether a UUID is on the reserved denylist.
pub fn is_reserved(uuid: &Uuid) -> bool {
    RESERVED.contains(uuid)
}

/// An immutable, validated device identifier.
///
/// Instances only come out of the generator or out of [`Identifier::parse`],
/// both of which run the validator first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    uuid: Uuid,
    text: String,
}

impl Identifier {
    /// Build an identifier from a UUID, enforcing the format invariant.
    pub(crate) fn from_uuid(uuid: Uuid) -> Result<Self> {
        let text = uuid
            .hyphenated()
            .encode_upper(&mut Uuid::encode_buffer())
            .to_string();
        if !is_canonical(&text) || is_reserved(&uuid) {
            return Err(IdRotorError::format_violation(text));
        }
        Ok(Self { uuid, text })
    }

    /// Parse a canonical identifier string.
    ///
    /// Reserved values fail validation like any malformed string.
    pub fn parse(value: &str) -> Result<Self> {
        if !is_canonical(value) {
            return Err(IdRotorError::format_violation(value));
        }
        let uuid = Uuid::parse_str(value).map_err(|_| IdRotorError::format_violation(value))?;
        Self::from_uuid(uuid)
    }

    /// Parse a previously persisted value, accepting lowercase hex.
    ///
    /// Older builds stored `uuidString.lowercased()`.
    pub fn parse_persisted(value: &str) -> Result<Self> {
        Self::parse(&value.trim().to_ascii_uppercase())
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The structured UUID form, for entry points that return UUID objects.
    pub fn as_uuid(&self) -> Uuid {
        self.uuid
    }

    /// Short prefix suitable for log lines.
    pub fn redacted(&self) -> &str {
        &self.text[..8]
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.text)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl FromStr for Identifier {
    type Err = IdRotorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
