//! In-process stand-in for a lock radio link.
//!
//! Every exchange succeeds after a fixed latency, except that a lock whose
//! last address octet is `E6` refuses add-device with "not in pairing
//! mode". Key ids are handed out sequentially from 1. Every lock carries
//! the same journal of `journal_records` unlock entries, and reports an
//! NB-IoT modem but no Cat.1 module.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, json};
use tracing::debug;

use lockbridge_config::SimulatorSettings;
use lockbridge_core::{
    AckStatus, AuthMaterial, ChunkAck, DnaInfo, KeyChunk, LockRecord, LockTransport, LogVersion,
    MacAddress, NbIotInfo, RecordPage, RecordQuery, RfModuleType, SysParam, TransportError,
    WifiCredentials,
};

const REFUSING_OCTET: &str = "e6";

/// Timestamp of the first simulated journal entry.
const JOURNAL_EPOCH: u64 = 1_700_000_000;

pub struct SimulatedTransport {
    latency: Duration,
    frame_payload: usize,
    journal_records: usize,
    next_key_id: AtomicU16,
}

impl SimulatedTransport {
    pub fn new(settings: &SimulatorSettings) -> Self {
        Self {
            latency: Duration::from_millis(settings.latency_ms),
            frame_payload: settings.frame_payload,
            journal_records: settings.journal_records,
            next_key_id: AtomicU16::new(1),
        }
    }

    async fn exchange(&self, step: &'static str, mac: &MacAddress) {
        debug!(%mac, step, "simulated exchange");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Hex digits of the address, used to derive stable fake credentials.
fn digits(mac: &MacAddress) -> String {
    mac.normalized().chars().filter(char::is_ascii_hexdigit).collect()
}

fn dna(mac: &MacAddress, device_type: u8) -> DnaInfo {
    let digits = digits(mac);
    let suffix = digits.get(digits.len().saturating_sub(4)..).unwrap_or_default();
    DnaInfo {
        mac: mac.as_str().to_owned(),
        device_type,
        hardware_version: "1.0".into(),
        software_version: "sim-1.0.0".into(),
        protocol_version: 3,
        rf_module_type: RfModuleType::Wifi,
        rf_module_mac: None,
        device_name: Some(format!("Simulated Lock {}", suffix.to_uppercase())),
        auth_code: SecretString::from(format!("{:0>8}", digits.get(..8).unwrap_or(digits.as_str()))),
        dna_key: SecretString::from(format!("{digits:0>32}")),
    }
}

fn journal_entry(index: usize, log_version: LogVersion) -> LockRecord {
    let mut fields = Map::new();
    fields.insert("recordTime".into(), json!(JOURNAL_EPOCH + u64::try_from(index).unwrap_or_default() * 60));
    fields.insert("lockKeyId".into(), json!(index % 4 + 1));
    fields.insert("unlockType".into(), json!("fingerprint"));
    let model = match log_version {
        LogVersion::V1 => "HXRecordUnlockModel",
        LogVersion::V2 => "HXRecord2UnlockModel",
    };
    LockRecord::new(model, log_version, fields)
}

#[async_trait]
impl LockTransport for SimulatedTransport {
    async fn connect(&self, mac: &MacAddress) -> Result<(), TransportError> {
        self.exchange("connect", mac).await;
        Ok(())
    }

    async fn disconnect(&self, mac: &MacAddress) {
        debug!(%mac, "simulated disconnect");
    }

    async fn abort(&self, mac: &MacAddress) {
        debug!(%mac, "simulated abort");
    }

    async fn add_device(&self, mac: &MacAddress, chip_type: u8) -> Result<DnaInfo, TransportError> {
        self.exchange("add_device", mac).await;
        if mac.normalized().ends_with(REFUSING_OCTET) {
            return Err(TransportError::Status(AckStatus::NotPairing));
        }
        Ok(dna(mac, chip_type))
    }

    async fn get_sys_param(&self, auth: &AuthMaterial) -> Result<SysParam, TransportError> {
        self.exchange("get_sys_param", &auth.mac).await;
        Ok(SysParam {
            lock_mac: Some(auth.mac.as_str().to_owned()),
            battery_percent: Some(100),
            volume: Some(2),
            normally_open: Some(false),
        })
    }

    async fn pair_success_ind(&self, auth: &AuthMaterial) -> Result<(), TransportError> {
        self.exchange("pair_success_ind", &auth.mac).await;
        Ok(())
    }

    async fn rf_module_pairing(&self, auth: &AuthMaterial) -> Result<(), TransportError> {
        self.exchange("rf_module_pairing", &auth.mac).await;
        Ok(())
    }

    async fn register_wifi(
        &self,
        auth: &AuthMaterial,
        credentials: &WifiCredentials,
    ) -> Result<(), TransportError> {
        debug!(ssid = %credentials.ssid, wifi_type = credentials.wifi_type, "simulated WiFi join");
        self.exchange("register_wifi", &auth.mac).await;
        Ok(())
    }

    fn max_frame_payload(&self) -> usize {
        self.frame_payload
    }

    async fn send_key_chunk(
        &self,
        auth: &AuthMaterial,
        chunk: &KeyChunk,
    ) -> Result<ChunkAck, TransportError> {
        self.exchange("send_key_chunk", &auth.mac).await;
        let lock_key_id = if chunk.is_last {
            self.next_key_id.fetch_add(1, Ordering::Relaxed)
        } else {
            0
        };
        Ok(ChunkAck {
            lock_key_id,
            awaiting_confirmation: false,
        })
    }

    async fn await_key_confirmation(&self, auth: &AuthMaterial) -> Result<u16, TransportError> {
        self.exchange("await_key_confirmation", &auth.mac).await;
        Ok(self.next_key_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn open_lock(&self, auth: &AuthMaterial) -> Result<(), TransportError> {
        self.exchange("open_lock", &auth.mac).await;
        Ok(())
    }

    async fn close_lock(&self, auth: &AuthMaterial) -> Result<(), TransportError> {
        self.exchange("close_lock", &auth.mac).await;
        Ok(())
    }

    async fn delete_lock(&self, auth: &AuthMaterial) -> Result<(), TransportError> {
        self.exchange("delete_lock", &auth.mac).await;
        Ok(())
    }

    async fn get_dna(&self, auth: &AuthMaterial) -> Result<DnaInfo, TransportError> {
        self.exchange("get_dna", &auth.mac).await;
        Ok(dna(&auth.mac, 0))
    }

    async fn set_key_expiration_alarm(
        &self,
        auth: &AuthMaterial,
        time: u32,
    ) -> Result<(), TransportError> {
        debug!(time, "simulated expiration alarm");
        self.exchange("set_key_expiration_alarm", &auth.mac).await;
        Ok(())
    }

    async fn nb_iot_info(&self, auth: &AuthMaterial) -> Result<NbIotInfo, TransportError> {
        self.exchange("nb_iot_info", &auth.mac).await;
        let digits = digits(&auth.mac);
        Ok(NbIotInfo {
            rssi: -85,
            imsi: format!("{digits:0>15}").chars().take(15).collect(),
            imei: format!("86{digits:0>13}").chars().take(15).collect(),
        })
    }

    async fn record_count(&self, auth: &AuthMaterial) -> Result<usize, TransportError> {
        self.exchange("record_count", &auth.mac).await;
        Ok(self.journal_records)
    }

    async fn read_records(
        &self,
        auth: &AuthMaterial,
        query: &RecordQuery,
    ) -> Result<RecordPage, TransportError> {
        self.exchange("read_records", &auth.mac).await;
        let start = query.start.min(self.journal_records);
        let end = (query.start + query.count).min(self.journal_records);
        Ok(RecordPage {
            records: (start..end)
                .map(|index| journal_entry(index, query.log_version))
                .collect(),
            more_data: end < self.journal_records,
        })
    }
}
