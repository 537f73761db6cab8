// ── Device identity ──
//
// Locks are addressed by MAC on Android and by peripheral UUID on iOS.
// Either way the identifier is case-insensitive: equality and hashing use
// the lowercase form while the caller's spelling is kept for display.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Case-insensitive device identifier.
#[derive(Debug, Clone)]
pub struct MacAddress {
    raw: String,
    normalized: String,
}

impl MacAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into().trim().to_owned();
        let normalized = raw.to_lowercase();
        Self { raw, normalized }
    }

    /// The identifier exactly as the caller supplied it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercase form used for every cache lookup.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl PartialEq for MacAddress {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for MacAddress {}

impl Hash for MacAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for MacAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MacAddress {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
