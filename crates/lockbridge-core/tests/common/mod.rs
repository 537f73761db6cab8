//! Scripted lock transport shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lockbridge_core::{
    AuthMaterial, Bridge, BridgeConfig, BridgeEvent, ChunkAck, DnaInfo, EventReceiver,
    KeyChunk, LockRecord, LockTransport, LogVersion, MacAddress, NbIotInfo, RecordPage,
    RecordQuery, RfModuleType, SysParam, TransportError, WifiCredentials,
};
use secrecy::SecretString;
use serde_json::{Map, json};
use tokio::sync::Notify;

pub const LOCK: &str = "AA:BB:CC:DD:EE:FF";

/// Transport exchanges a test can script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Connect,
    Disconnect,
    Abort,
    AddDevice,
    GetSysParam,
    PairSuccessInd,
    RfModulePairing,
    RegisterWifi,
    SendKeyChunk,
    AwaitConfirmation,
    OpenLock,
    CloseLock,
    DeleteLock,
    GetDna,
    SetAlarm,
    NbIotInfo,
    RecordCount,
    ReadRecords,
}

#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<Step>>,
    failures: Mutex<HashMap<Step, TransportError>>,
    hangs: Mutex<HashSet<Step>>,
    released: Notify,
    chunks: Mutex<Vec<KeyChunk>>,
    wifi: Mutex<Vec<WifiCredentials>>,
    record_queries: Mutex<Vec<RecordQuery>>,
    alarm_times: Mutex<Vec<u32>>,
    frame_payload: Option<usize>,
    confirm_last_chunk: AtomicBool,
    /// Entries the lock actually returns.
    stored_records: AtomicUsize,
    /// Entries the lock claims to hold.
    reported_records: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_frame_payload(size: usize) -> Arc<Self> {
        Arc::new(Self {
            frame_payload: Some(size),
            ..Self::default()
        })
    }

    /// Make `step` fail with `err` every time.
    pub fn fail(&self, step: Step, err: TransportError) {
        self.failures.lock().unwrap().insert(step, err);
    }

    /// Hold every call to `step` until [`release`](Self::release).
    pub fn hang(&self, step: Step) {
        self.hangs.lock().unwrap().insert(step);
    }

    /// Let held and future calls to `step` through.
    pub fn release(&self, step: Step) {
        self.hangs.lock().unwrap().remove(&step);
        self.released.notify_waiters();
    }

    /// Journal holding `count` entries.
    pub fn journal(&self, count: usize) {
        self.stored_records.store(count, Ordering::SeqCst);
        self.reported_records.store(count, Ordering::SeqCst);
    }

    /// Journal whose count claims more entries than it returns.
    pub fn overstated_journal(&self, stored: usize, reported: usize) {
        self.stored_records.store(stored, Ordering::SeqCst);
        self.reported_records.store(reported, Ordering::SeqCst);
    }

    pub fn record_queries(&self) -> Vec<RecordQuery> {
        self.record_queries.lock().unwrap().clone()
    }

    pub fn alarm_times(&self) -> Vec<u32> {
        self.alarm_times.lock().unwrap().clone()
    }

    /// Final chunk acks report that the lock is still confirming.
    pub fn confirm_last_chunk(&self) {
        self.confirm_last_chunk.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Step> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, step: Step) -> usize {
        self.calls().iter().filter(|s| **s == step).count()
    }

    pub fn chunks(&self) -> Vec<KeyChunk> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn wifi_requests(&self) -> Vec<WifiCredentials> {
        self.wifi.lock().unwrap().clone()
    }

    async fn hold(&self, step: Step) {
        self.calls.lock().unwrap().push(step);
        loop {
            let released = self.released.notified();
            if !self.hangs.lock().unwrap().contains(&step) {
                break;
            }
            released.await;
        }
    }

    async fn gate(&self, step: Step) -> Result<(), TransportError> {
        self.hold(step).await;
        match self.failures.lock().unwrap().get(&step) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn dna() -> DnaInfo {
    DnaInfo {
        mac: LOCK.into(),
        device_type: 3,
        hardware_version: "1.2".into(),
        software_version: "4.0.7".into(),
        protocol_version: 3,
        rf_module_type: RfModuleType::Wifi,
        rf_module_mac: None,
        device_name: Some("Front Door".into()),
        auth_code: SecretString::from("A1B2C3D4".to_owned()),
        dna_key: SecretString::from("00112233445566778899aabbccddeeff".to_owned()),
    }
}

#[async_trait]
impl LockTransport for MockTransport {
    async fn connect(&self, _mac: &MacAddress) -> Result<(), TransportError> {
        self.gate(Step::Connect).await
    }

    async fn disconnect(&self, _mac: &MacAddress) {
        self.hold(Step::Disconnect).await;
    }

    async fn abort(&self, _mac: &MacAddress) {
        self.hold(Step::Abort).await;
    }

    async fn add_device(&self, _mac: &MacAddress, _chip_type: u8) -> Result<DnaInfo, TransportError> {
        self.gate(Step::AddDevice).await?;
        Ok(dna())
    }

    async fn get_sys_param(&self, _auth: &AuthMaterial) -> Result<SysParam, TransportError> {
        self.gate(Step::GetSysParam).await?;
        Ok(SysParam {
            battery_percent: Some(87),
            ..SysParam::default()
        })
    }

    async fn pair_success_ind(&self, _auth: &AuthMaterial) -> Result<(), TransportError> {
        self.gate(Step::PairSuccessInd).await
    }

    async fn rf_module_pairing(&self, _auth: &AuthMaterial) -> Result<(), TransportError> {
        self.gate(Step::RfModulePairing).await
    }

    async fn register_wifi(
        &self,
        _auth: &AuthMaterial,
        credentials: &WifiCredentials,
    ) -> Result<(), TransportError> {
        self.wifi.lock().unwrap().push(credentials.clone());
        self.gate(Step::RegisterWifi).await
    }

    fn max_frame_payload(&self) -> usize {
        self.frame_payload
            .unwrap_or(lockbridge_core::transport::DEFAULT_FRAME_PAYLOAD)
    }

    async fn send_key_chunk(
        &self,
        _auth: &AuthMaterial,
        chunk: &KeyChunk,
    ) -> Result<ChunkAck, TransportError> {
        self.chunks.lock().unwrap().push(chunk.clone());
        self.gate(Step::SendKeyChunk).await?;
        let awaiting = chunk.is_last && self.confirm_last_chunk.load(Ordering::SeqCst);
        Ok(ChunkAck {
            lock_key_id: if chunk.is_last && !awaiting { 7 } else { 0 },
            awaiting_confirmation: awaiting,
        })
    }

    async fn await_key_confirmation(&self, _auth: &AuthMaterial) -> Result<u16, TransportError> {
        self.gate(Step::AwaitConfirmation).await?;
        Ok(42)
    }

    async fn open_lock(&self, _auth: &AuthMaterial) -> Result<(), TransportError> {
        self.gate(Step::OpenLock).await
    }

    async fn close_lock(&self, _auth: &AuthMaterial) -> Result<(), TransportError> {
        self.gate(Step::CloseLock).await
    }

    async fn delete_lock(&self, _auth: &AuthMaterial) -> Result<(), TransportError> {
        self.gate(Step::DeleteLock).await
    }

    async fn get_dna(&self, _auth: &AuthMaterial) -> Result<DnaInfo, TransportError> {
        self.gate(Step::GetDna).await?;
        Ok(dna())
    }

    async fn set_key_expiration_alarm(
        &self,
        _auth: &AuthMaterial,
        time: u32,
    ) -> Result<(), TransportError> {
        self.alarm_times.lock().unwrap().push(time);
        self.gate(Step::SetAlarm).await
    }

    async fn nb_iot_info(&self, _auth: &AuthMaterial) -> Result<NbIotInfo, TransportError> {
        self.gate(Step::NbIotInfo).await?;
        Ok(NbIotInfo {
            rssi: -83,
            imsi: "460041234567890".into(),
            imei: "861234567890123".into(),
        })
    }

    async fn record_count(&self, _auth: &AuthMaterial) -> Result<usize, TransportError> {
        self.gate(Step::RecordCount).await?;
        Ok(self.reported_records.load(Ordering::SeqCst))
    }

    async fn read_records(
        &self,
        _auth: &AuthMaterial,
        query: &RecordQuery,
    ) -> Result<RecordPage, TransportError> {
        self.record_queries.lock().unwrap().push(*query);
        self.gate(Step::ReadRecords).await?;
        let stored = self.stored_records.load(Ordering::SeqCst);
        let reported = self.reported_records.load(Ordering::SeqCst);
        let end = (query.start + query.count).min(stored);
        Ok(RecordPage {
            records: (query.start.min(end)..end)
                .map(|index| record(index, query.log_version))
                .collect(),
            more_data: end < reported,
        })
    }
}

/// Journal entry `index` as the mock lock reports it.
pub fn record(index: usize, log_version: LogVersion) -> LockRecord {
    let mut fields = Map::new();
    fields.insert("recordIndex".into(), json!(index));
    fields.insert("recordType".into(), json!("unlock"));
    let model = match log_version {
        LogVersion::V1 => "HXRecordUnlockModel",
        LogVersion::V2 => "HXRecord2UnlockModel",
    };
    LockRecord::new(model, log_version, fields)
}

// ── Bridge helpers ──────────────────────────────────────────────────

pub fn bridge(transport: &Arc<MockTransport>) -> Bridge {
    bridge_with_config(transport, BridgeConfig::default())
}

pub fn bridge_with_config(transport: &Arc<MockTransport>, config: BridgeConfig) -> Bridge {
    let transport: Arc<dyn LockTransport> = transport.clone();
    Bridge::new(transport, config)
}

/// Bridge whose auth cache already holds credentials for [`LOCK`].
pub fn paired_bridge(transport: &Arc<MockTransport>) -> Bridge {
    let bridge = bridge(transport);
    let mac = MacAddress::new(LOCK);
    bridge
        .auth_cache()
        .set(&mac, AuthMaterial::from_token(mac.clone(), "cached-token"));
    bridge
}

/// Collect events until (and including) the next terminal one.
pub async fn until_terminal(rx: &mut EventReceiver) -> Vec<BridgeEvent> {
    let collect = async {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    };
    tokio::time::timeout(Duration::from_secs(300), collect)
        .await
        .expect("session never reached a terminal event")
}

/// Give spawned tasks a chance to run and assert nothing else arrived.
pub async fn assert_quiet(rx: &mut EventReceiver) {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(rx.try_recv().is_none(), "unexpected event after terminal");
}
