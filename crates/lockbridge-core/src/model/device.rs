// ── Lock peripherals ──

use bytes::Bytes;
use serde::Serialize;

use super::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum DeviceType {
    SmartLock,
    Unknown,
}

/// Immutable snapshot of a peripheral the host wants to talk to.
///
/// Classification is the scanner's job: the host's scan filter already
/// knows which advertisements belong to locks, so the type is passed in
/// rather than guessed from the payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: MacAddress,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    #[serde(skip)]
    pub advertisement: Bytes,
    pub device_type: DeviceType,
}

impl Device {
    /// Build from a scan result the host has already classified.
    pub fn from_advertisement(
        id: MacAddress,
        name: Option<String>,
        rssi: Option<i16>,
        advertisement: Bytes,
        device_type: DeviceType,
    ) -> Self {
        Self {
            id,
            name: name.filter(|n| !n.is_empty()),
            rssi,
            advertisement,
            device_type,
        }
    }

    /// Build from an identifier the host already knows to be a lock.
    pub fn from_id(id: MacAddress, name: Option<String>) -> Self {
        Self {
            id,
            name: name.filter(|n| !n.is_empty()),
            rssi: None,
            advertisement: Bytes::new(),
            device_type: DeviceType::SmartLock,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}
