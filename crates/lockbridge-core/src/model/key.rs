// ── Biometric key model ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Key groups the firmware reserves for app-managed users.
pub const KEY_GROUP_RANGE: std::ops::RangeInclusive<u16> = 900..=4095;

/// Delete mode stamped on every enrolled key: removable by key id.
pub const DELETE_BY_KEY_ID: u8 = 1;

/// Biometric key kind.
///
/// On the wire a key type is either its lowercase name or the vendor's
/// numeric tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum KeyType {
    Fingerprint,
    Face,
}

impl KeyType {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Fingerprint => 0x01,
            Self::Face => 0x40,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::Fingerprint),
            0x40 => Some(Self::Face),
            _ => None,
        }
    }
}

impl Serialize for KeyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KeyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Tag(u8),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Tag(tag) => Self::from_tag(tag)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown key type tag {tag}"))),
            Raw::Name(name) => name
                .to_lowercase()
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("unknown key type {name:?}"))),
        }
    }
}

// ── KeyValidity ─────────────────────────────────────────────────────

/// When and how often an enrolled key may open the lock.
///
/// Times are unix seconds; an end time of zero means no expiry. Day
/// boundaries are minutes since midnight and `weeks` is a weekday bitmask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValidity {
    pub valid_start_time: i64,
    pub valid_end_time: i64,
    pub valid_number: u16,
    pub auth_mode: u8,
    pub weeks: u8,
    pub day_start_times: u16,
    pub day_end_times: u16,
}

impl Default for KeyValidity {
    fn default() -> Self {
        Self {
            valid_start_time: 0,
            valid_end_time: 0,
            valid_number: 0xFF,
            auth_mode: 1,
            weeks: 0,
            day_start_times: 0,
            day_end_times: 0,
        }
    }
}

impl KeyValidity {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.valid_start_time < 0 || self.valid_end_time < 0 {
            return Err(CoreError::invalid("validity", "times must not be negative"));
        }
        if self.valid_end_time != 0 && self.valid_end_time < self.valid_start_time {
            return Err(CoreError::invalid(
                "validity",
                "validEndTime precedes validStartTime",
            ));
        }
        if self.day_start_times >= 1440 || self.day_end_times >= 1440 {
            return Err(CoreError::invalid(
                "validity",
                "day times are minutes since midnight",
            ));
        }
        Ok(())
    }
}

// ── EnrolledKey ─────────────────────────────────────────────────────

/// Key object reported once the lock has stored a transferred key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledKey {
    pub lock_key_id: u16,
    pub key_group_id: u16,
    pub key_type: KeyType,
    #[serde(flatten)]
    pub validity: KeyValidity,
    pub modified_at: DateTime<Utc>,
    pub delete_mode: u8,
}

impl EnrolledKey {
    pub fn new(lock_key_id: u16, key_group_id: u16, key_type: KeyType, validity: KeyValidity) -> Self {
        Self {
            lock_key_id,
            key_group_id,
            key_type,
            validity,
            modified_at: Utc::now(),
            delete_mode: DELETE_BY_KEY_ID,
        }
    }
}
