// ── Command API ──
//
// Host method calls arrive as `(name, args)` pairs. `Command::from_method`
// turns them into typed commands; the bridge routes each variant to the
// owning orchestrator.

pub mod requests;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::error::CoreError;
use crate::model::{Cat1Info, DeviceInfo, LogVersion, MacAddress, NbIotInfo, RecordWindow};
use crate::orchestrator::{KeyTransferRequest, PairRequest, RecordSyncRequest, WifiRequest};
use crate::radio::RadioState;

pub use requests::{AlarmArgs, DeviceArgs, KeyTransferArgs, PairArgs, RecordArgs, WifiArgs};

/// Everything the host can ask of the bridge.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Pairing ──────────────────────────────────────────────────────
    Pair { request: PairRequest, force: bool },
    CancelPairing,
    IsPairing,

    // ── WiFi ─────────────────────────────────────────────────────────
    ConfigureWifi { request: WifiRequest, force: bool },
    CancelWifiConfig,
    IsConfiguringWifi,

    // ── Key transfer ─────────────────────────────────────────────────
    StartKeyTransfer {
        request: KeyTransferRequest,
        force: bool,
    },
    CancelKeyTransfer,
    IsTransferringKey,

    // ── Journal ──────────────────────────────────────────────────────
    SyncRecords {
        request: RecordSyncRequest,
        force: bool,
    },
    ReadRecordPage {
        device_id: MacAddress,
        log_version: LogVersion,
        start: usize,
        count: usize,
    },
    CancelRecordSync,
    IsSyncingRecords,

    // ── Lock commands ────────────────────────────────────────────────
    OpenLock { device_id: MacAddress },
    CloseLock { device_id: MacAddress },
    DeleteLock { device_id: MacAddress },
    ConfirmPairing { device_id: MacAddress },
    GetDna { device_id: MacAddress },
    SetKeyExpirationAlarm { device_id: MacAddress, time: u32 },
    GetNbIotInfo { device_id: MacAddress },
    GetCat1Info { device_id: MacAddress },

    // ── State ────────────────────────────────────────────────────────
    GetBluetoothState,
    ClearAuth { device_id: MacAddress },
    GetLastConnectedMac,
}

impl Command {
    /// Parse a host method call.
    pub fn from_method(method: &str, args: Value) -> Result<Self, CoreError> {
        let command = match method {
            "pair" | "addDevice" => {
                let args: PairArgs = parse(args)?;
                let force = args.force;
                Self::Pair {
                    request: args.into(),
                    force,
                }
            }
            "cancelPairing" => Self::CancelPairing,
            "isPairing" => Self::IsPairing,
            "configureWifi" | "registerWifi" => {
                let args: WifiArgs = parse(args)?;
                let force = args.force;
                Self::ConfigureWifi {
                    request: args.into(),
                    force,
                }
            }
            "cancelWifiConfig" => Self::CancelWifiConfig,
            "isConfiguringWifi" => Self::IsConfiguringWifi,
            "startKeyTransfer" | "addBigDataKey" => {
                let args: KeyTransferArgs = parse(args)?;
                let force = args.force;
                Self::StartKeyTransfer {
                    request: args.into(),
                    force,
                }
            }
            "cancelKeyTransfer" => Self::CancelKeyTransfer,
            "isTransferringKey" => Self::IsTransferringKey,
            "syncLockRecords" | "syncLockRecordsStream" => {
                let args: RecordArgs = parse(args)?;
                let force = args.force;
                Self::SyncRecords {
                    request: args.into(),
                    force,
                }
            }
            "syncLockRecordsPage" => {
                let args: RecordArgs = parse(args)?;
                Self::ReadRecordPage {
                    log_version: args.log_version(),
                    device_id: MacAddress::new(args.device_id),
                    start: args.start_num,
                    count: args.read_cnt,
                }
            }
            "cancelLockRecordSync" => Self::CancelRecordSync,
            "isSyncingLockRecords" => Self::IsSyncingRecords,
            "openLock" => Self::OpenLock {
                device_id: device(args)?,
            },
            "closeLock" => Self::CloseLock {
                device_id: device(args)?,
            },
            "deleteLock" => Self::DeleteLock {
                device_id: device(args)?,
            },
            "pairSuccessInd" => Self::ConfirmPairing {
                device_id: device(args)?,
            },
            "getDna" => Self::GetDna {
                device_id: device(args)?,
            },
            "setKeyExpirationAlarmTime" => {
                let args: AlarmArgs = parse(args)?;
                Self::SetKeyExpirationAlarm {
                    device_id: MacAddress::new(args.device_id),
                    time: args.time,
                }
            }
            "getNBIoTInfo" => Self::GetNbIotInfo {
                device_id: device(args)?,
            },
            "getCat1Info" => Self::GetCat1Info {
                device_id: device(args)?,
            },
            "getBluetoothState" => Self::GetBluetoothState,
            "clearAuth" => Self::ClearAuth {
                device_id: device(args)?,
            },
            "getLastConnectedMac" => Self::GetLastConnectedMac,
            other => {
                return Err(CoreError::UnknownMethod {
                    method: other.to_owned(),
                });
            }
        };
        Ok(command)
    }

    /// Method name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pair { .. } => "pair",
            Self::CancelPairing => "cancelPairing",
            Self::IsPairing => "isPairing",
            Self::ConfigureWifi { .. } => "configureWifi",
            Self::CancelWifiConfig => "cancelWifiConfig",
            Self::IsConfiguringWifi => "isConfiguringWifi",
            Self::StartKeyTransfer { .. } => "startKeyTransfer",
            Self::CancelKeyTransfer => "cancelKeyTransfer",
            Self::IsTransferringKey => "isTransferringKey",
            Self::SyncRecords { .. } => "syncLockRecords",
            Self::ReadRecordPage { .. } => "syncLockRecordsPage",
            Self::CancelRecordSync => "cancelLockRecordSync",
            Self::IsSyncingRecords => "isSyncingLockRecords",
            Self::OpenLock { .. } => "openLock",
            Self::CloseLock { .. } => "closeLock",
            Self::DeleteLock { .. } => "deleteLock",
            Self::ConfirmPairing { .. } => "pairSuccessInd",
            Self::GetDna { .. } => "getDna",
            Self::SetKeyExpirationAlarm { .. } => "setKeyExpirationAlarmTime",
            Self::GetNbIotInfo { .. } => "getNBIoTInfo",
            Self::GetCat1Info { .. } => "getCat1Info",
            Self::GetBluetoothState => "getBluetoothState",
            Self::ClearAuth { .. } => "clearAuth",
            Self::GetLastConnectedMac => "getLastConnectedMac",
        }
    }
}

fn parse<T: DeserializeOwned>(args: Value) -> Result<T, CoreError> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| CoreError::invalid("arguments", e.to_string()))
}

fn device(args: Value) -> Result<MacAddress, CoreError> {
    let args: DeviceArgs = parse(args)?;
    Ok(MacAddress::new(args.device_id))
}

// ── CommandResult ───────────────────────────────────────────────────

/// Immediate answer to a command. Long-running work reports through events.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// A session was accepted and is running.
    Started { session_id: Uuid },
    /// Whether a live session was asked to stop.
    Cancelled(bool),
    Flag(bool),
    BluetoothState(RadioState),
    LastConnectedMac(Option<String>),
    /// Whether cached credentials were removed.
    Cleared(bool),
    /// A lock command was acknowledged.
    Done,
    Dna(Box<DeviceInfo>),
    NbIotInfo(NbIotInfo),
    Cat1Info(Cat1Info),
    RecordWindow(RecordWindow),
}

impl CommandResult {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Started { session_id } => json!({ "sessionId": session_id }),
            Self::Cancelled(cancelled) => json!({ "cancelled": cancelled }),
            Self::Flag(flag) => json!(flag),
            Self::BluetoothState(state) => json!({ "state": state }),
            Self::LastConnectedMac(mac) => json!(mac),
            Self::Cleared(removed) => json!({ "removed": removed }),
            Self::Done => json!(true),
            Self::Dna(info) => json!(info),
            Self::NbIotInfo(info) => json!(info),
            Self::Cat1Info(info) => json!(info),
            Self::RecordWindow(window) => json!(window),
        }
    }
}
