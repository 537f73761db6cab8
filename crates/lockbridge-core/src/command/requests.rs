// ── Host argument shapes ──
//
// Method-call arguments as the host sends them (camelCase JSON), converted
// into the orchestrators' typed requests.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::model::{
    DEFAULT_KEY_GROUP_ID, DEFAULT_RECORD_PAGE_SIZE, KeyType, KeyValidity, LogVersion, MacAddress,
};
use crate::orchestrator::{KeyTransferRequest, PairRequest, RecordSyncRequest, WifiRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairArgs {
    #[serde(alias = "mac")]
    pub device_id: String,
    pub auth_token: Option<String>,
    pub device_name: Option<String>,
    pub chip_type: Option<u8>,
    #[serde(default)]
    pub force: bool,
}

impl From<PairArgs> for PairRequest {
    fn from(args: PairArgs) -> Self {
        Self {
            device_id: MacAddress::new(args.device_id),
            auth_token: args
                .auth_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            device_name: args.device_name,
            chip_type: args.chip_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiArgs {
    #[serde(alias = "mac")]
    pub device_id: String,
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub wifi_type: i64,
    /// Seconds.
    pub timeout: Option<u64>,
    #[serde(default)]
    pub force: bool,
}

impl From<WifiArgs> for WifiRequest {
    fn from(args: WifiArgs) -> Self {
        Self {
            device_id: MacAddress::new(args.device_id),
            ssid: args.ssid,
            password: SecretString::from(args.password),
            wifi_type: args.wifi_type,
            timeout: args.timeout.map(Duration::from_secs),
        }
    }
}

fn default_key_group() -> i64 {
    i64::from(DEFAULT_KEY_GROUP_ID)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTransferArgs {
    #[serde(alias = "mac")]
    pub device_id: String,
    #[serde(default, alias = "bigDataBase64")]
    pub payload: String,
    #[serde(default = "default_key_group")]
    pub key_group_id: i64,
    pub key_type: KeyType,
    #[serde(default)]
    pub validity: KeyValidity,
    #[serde(default)]
    pub force: bool,
}

impl From<KeyTransferArgs> for KeyTransferRequest {
    fn from(args: KeyTransferArgs) -> Self {
        Self {
            device_id: MacAddress::new(args.device_id),
            payload_base64: args.payload,
            key_group_id: args.key_group_id,
            key_type: args.key_type,
            validity: args.validity,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceArgs {
    #[serde(alias = "mac")]
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmArgs {
    #[serde(alias = "mac")]
    pub device_id: String,
    pub time: u32,
}

fn default_page_size() -> usize {
    DEFAULT_RECORD_PAGE_SIZE
}

/// Journal reads. `logVersion` wins over `menuFeature` when both are sent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordArgs {
    #[serde(alias = "mac")]
    pub device_id: String,
    pub log_version: Option<i64>,
    pub menu_feature: Option<i64>,
    #[serde(default)]
    pub start_num: usize,
    #[serde(default = "default_page_size", alias = "pageSize")]
    pub read_cnt: usize,
    #[serde(default)]
    pub force: bool,
}

impl RecordArgs {
    pub fn log_version(&self) -> LogVersion {
        LogVersion::resolve(self.log_version, self.menu_feature)
    }
}

impl From<RecordArgs> for RecordSyncRequest {
    fn from(args: RecordArgs) -> Self {
        Self {
            log_version: args.log_version(),
            device_id: MacAddress::new(args.device_id),
            page_size: args.read_cnt,
        }
    }
}
