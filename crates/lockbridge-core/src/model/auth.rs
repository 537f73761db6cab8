// ── Authentication material and lock identity ──

use secrecy::SecretString;
use serde::Serialize;

use super::{Device, MacAddress};

/// Key group assigned when the caller does not pick one.
pub const DEFAULT_KEY_GROUP_ID: u16 = 900;

/// Credentials required for any authenticated exchange with a lock.
///
/// Secrets stay wrapped in [`SecretString`]; `Debug` output redacts them.
#[derive(Debug, Clone)]
pub struct AuthMaterial {
    pub mac: MacAddress,
    pub auth_code: SecretString,
    pub dna_key: Option<SecretString>,
    pub protocol_version: Option<u8>,
    pub key_group_id: u16,
}

impl AuthMaterial {
    /// Material supplied by the host from an earlier pairing.
    pub fn from_token(mac: MacAddress, token: &str) -> Self {
        Self {
            mac,
            auth_code: SecretString::from(token.to_owned()),
            dna_key: None,
            protocol_version: None,
            key_group_id: DEFAULT_KEY_GROUP_ID,
        }
    }

    /// Material derived from a fresh add-device exchange.
    pub fn from_dna(mac: MacAddress, dna: &DnaInfo) -> Self {
        Self {
            mac,
            auth_code: dna.auth_code.clone(),
            dna_key: Some(dna.dna_key.clone()),
            protocol_version: Some(dna.protocol_version),
            key_group_id: DEFAULT_KEY_GROUP_ID,
        }
    }
}

// ── RfModuleType ────────────────────────────────────────────────────

/// Secondary radio module fitted to the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum RfModuleType {
    Tcv433,
    Lprx315,
    Tcv868,
    Wifi,
    NbIot,
    Lora,
    Zigbee,
    WifiIdCard,
    NbMqtt,
    NbLwm2m,
    Cat1,
    None,
    Other(u8),
}

impl RfModuleType {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Tcv433,
            1 => Self::Lprx315,
            2 => Self::Tcv868,
            4 => Self::Wifi,
            5 => Self::NbIot,
            6 => Self::Lora,
            7 => Self::Zigbee,
            8 => Self::WifiIdCard,
            9 => Self::NbMqtt,
            10 => Self::NbLwm2m,
            11 => Self::Cat1,
            255 => Self::None,
            other => Self::Other(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Tcv433 => 0,
            Self::Lprx315 => 1,
            Self::Tcv868 => 2,
            Self::Wifi => 4,
            Self::NbIot => 5,
            Self::Lora => 6,
            Self::Zigbee => 7,
            Self::WifiIdCard => 8,
            Self::NbMqtt => 9,
            Self::NbLwm2m => 10,
            Self::Cat1 => 11,
            Self::None => 255,
            Self::Other(code) => code,
        }
    }

    /// Whether the module can join a WiFi network.
    pub const fn supports_wifi(self) -> bool {
        matches!(self, Self::Wifi | Self::WifiIdCard)
    }
}

impl From<RfModuleType> for u8 {
    fn from(module: RfModuleType) -> Self {
        module.code()
    }
}

// ── DnaInfo ─────────────────────────────────────────────────────────

/// Identity record returned by the add-device exchange.
#[derive(Debug, Clone)]
pub struct DnaInfo {
    pub mac: String,
    pub device_type: u8,
    pub hardware_version: String,
    pub software_version: String,
    pub protocol_version: u8,
    pub rf_module_type: RfModuleType,
    pub rf_module_mac: Option<String>,
    pub device_name: Option<String>,
    pub auth_code: SecretString,
    pub dna_key: SecretString,
}

/// System parameters read with freshly issued credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SysParam {
    pub lock_mac: Option<String>,
    pub battery_percent: Option<u8>,
    pub volume: Option<u8>,
    pub normally_open: Option<bool>,
}

// ── DeviceInfo ──────────────────────────────────────────────────────

/// Public payload describing a freshly paired lock. Never carries secrets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub name: String,
    pub mac: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rf_module_type: Option<RfModuleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_param: Option<SysParam>,
}

impl DeviceInfo {
    /// Name precedence: the target's own (caller-supplied), then the
    /// lock's, then the id.
    pub fn new(target: &Device, dna: Option<&DnaInfo>, sys_param: Option<SysParam>) -> Self {
        let id = target.id.as_str();
        let name = target
            .name
            .as_deref()
            .or_else(|| dna.and_then(|d| d.device_name.as_deref()))
            .unwrap_or(id)
            .to_owned();

        Self {
            device_id: id.to_owned(),
            name,
            mac: dna.map_or_else(|| id.to_owned(), |d| d.mac.clone()),
            device_type: dna.map(|d| d.device_type),
            hardware_version: dna.map(|d| d.hardware_version.clone()),
            software_version: dna.map(|d| d.software_version.clone()),
            protocol_version: dna.map(|d| d.protocol_version),
            rf_module_type: dna.map(|d| d.rf_module_type),
            sys_param,
        }
    }
}
