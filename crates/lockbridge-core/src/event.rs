// ── Bridge events ──
//
// Everything the host hears asynchronously travels as a `BridgeEvent`.
// Serialization is the host contract: a `type` discriminant plus
// camelCase fields.

use serde::Serialize;

use crate::error::{ErrorKind, ErrorRecord};
use crate::model::{DeviceInfo, EnrolledKey, LockRecord};
use crate::radio::RadioState;

// ── Operation ───────────────────────────────────────────────────────

/// What a session or command was doing when it succeeded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Operation {
    Pairing,
    Wifi,
    KeyTransfer,
    RecordSync,
    LockCommand,
}

impl Operation {
    /// Label used in user-facing messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pairing => "pairing",
            Self::Wifi => "WiFi configuration",
            Self::KeyTransfer => "key transfer",
            Self::RecordSync => "lock record sync",
            Self::LockCommand => "lock command",
        }
    }

    pub const fn failure_kind(self) -> ErrorKind {
        match self {
            Self::Pairing => ErrorKind::PairingFailed,
            Self::Wifi => ErrorKind::WifiConfigFailed,
            Self::KeyTransfer | Self::RecordSync | Self::LockCommand => {
                ErrorKind::TransportInternal
            }
        }
    }

    pub const fn timeout_kind(self) -> ErrorKind {
        match self {
            Self::Pairing => ErrorKind::PairingTimeout,
            Self::Wifi => ErrorKind::WifiConfigTimeout,
            Self::KeyTransfer | Self::RecordSync | Self::LockCommand => {
                ErrorKind::TransportInternal
            }
        }
    }

    /// Only pairing reports cancellation with a dedicated code.
    pub const fn cancelled_kind(self) -> Option<ErrorKind> {
        match self {
            Self::Pairing => Some(ErrorKind::PairingCancelled),
            Self::Wifi | Self::KeyTransfer | Self::RecordSync | Self::LockCommand => None,
        }
    }
}

// ── Phases and outcomes ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum PairingPhase {
    Connecting,
    Authenticating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum WifiPhase {
    Configuring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum KeyTransferPhase {
    Sending,
    Confirming,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RecordSyncPhase {
    Counting,
    Reading,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Outcome {
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Status,
    Progress,
    Terminal,
}

/// Chunk-level progress of a key transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTransferUpdate {
    pub chunks_sent: usize,
    pub total_chunks: usize,
    pub bytes_sent: usize,
    pub total_bytes: usize,
    pub progress: f64,
}

impl KeyTransferUpdate {
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn new(chunks_sent: usize, total_chunks: usize, bytes_sent: usize, total_bytes: usize) -> Self {
        let progress = if bytes_sent >= total_bytes {
            1.0
        } else {
            bytes_sent as f64 / total_bytes as f64
        };
        Self {
            chunks_sent,
            total_chunks,
            bytes_sent,
            total_bytes,
            progress,
        }
    }
}

// ── BridgeEvent ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeEvent {
    PairingProgress {
        device_id: String,
        status: PairingPhase,
    },
    PairingResult {
        device_id: String,
        success: bool,
        outcome: Outcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        device_info: Option<DeviceInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorRecord>,
    },
    WifiProgress {
        device_id: String,
        status: WifiPhase,
    },
    WifiResult {
        device_id: String,
        success: bool,
        outcome: Outcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorRecord>,
    },
    KeyTransferProgress {
        device_id: String,
        phase: KeyTransferPhase,
        #[serde(flatten)]
        update: KeyTransferUpdate,
    },
    KeyTransferResult {
        device_id: String,
        success: bool,
        outcome: Outcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        phase: Option<KeyTransferPhase>,
        #[serde(skip_serializing_if = "Option::is_none")]
        key_object: Option<EnrolledKey>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorRecord>,
    },
    RecordSyncProgress {
        device_id: String,
        /// Records in this batch only.
        items: Vec<LockRecord>,
        total_so_far: usize,
        is_more: bool,
    },
    RecordSyncResult {
        device_id: String,
        success: bool,
        outcome: Outcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<Vec<LockRecord>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorRecord>,
    },
    BluetoothState {
        state: RadioState,
    },
}

impl BridgeEvent {
    /// Failed terminal for a session of `operation`. `None` for operations
    /// that never run as sessions.
    pub fn failed(operation: Operation, device_id: &str, error: ErrorRecord) -> Option<Self> {
        let device_id = device_id.to_owned();
        let error = Some(error);
        Some(match operation {
            Operation::Pairing => Self::PairingResult {
                device_id,
                success: false,
                outcome: Outcome::Failed,
                device_info: None,
                error,
            },
            Operation::Wifi => Self::WifiResult {
                device_id,
                success: false,
                outcome: Outcome::Failed,
                error,
            },
            Operation::KeyTransfer => Self::KeyTransferResult {
                device_id,
                success: false,
                outcome: Outcome::Failed,
                phase: None,
                key_object: None,
                error,
            },
            Operation::RecordSync => Self::RecordSyncResult {
                device_id,
                success: false,
                outcome: Outcome::Failed,
                total: None,
                items: None,
                error,
            },
            Operation::LockCommand => return None,
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::PairingProgress { .. } | Self::WifiProgress { .. } | Self::BluetoothState { .. } => {
                EventKind::Status
            }
            Self::KeyTransferProgress { .. } | Self::RecordSyncProgress { .. } => EventKind::Progress,
            Self::PairingResult { .. }
            | Self::WifiResult { .. }
            | Self::KeyTransferResult { .. }
            | Self::RecordSyncResult { .. } => EventKind::Terminal,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::PairingProgress { .. } | Self::PairingResult { .. } => Some(Operation::Pairing),
            Self::WifiProgress { .. } | Self::WifiResult { .. } => Some(Operation::Wifi),
            Self::KeyTransferProgress { .. } | Self::KeyTransferResult { .. } => {
                Some(Operation::KeyTransfer)
            }
            Self::RecordSyncProgress { .. } | Self::RecordSyncResult { .. } => {
                Some(Operation::RecordSync)
            }
            Self::BluetoothState { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind() == EventKind::Terminal
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::PairingProgress { device_id, .. }
            | Self::PairingResult { device_id, .. }
            | Self::WifiProgress { device_id, .. }
            | Self::WifiResult { device_id, .. }
            | Self::KeyTransferProgress { device_id, .. }
            | Self::KeyTransferResult { device_id, .. }
            | Self::RecordSyncProgress { device_id, .. }
            | Self::RecordSyncResult { device_id, .. } => Some(device_id),
            Self::BluetoothState { .. } => None,
        }
    }

    /// Terminal outcome, if this event ends a session.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::PairingResult { outcome, .. }
            | Self::WifiResult { outcome, .. }
            | Self::KeyTransferResult { outcome, .. }
            | Self::RecordSyncResult { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            Self::PairingResult { error, .. }
            | Self::WifiResult { error, .. }
            | Self::KeyTransferResult { error, .. }
            | Self::RecordSyncResult { error, .. } => error.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn operation_families() {
        assert_eq!(Operation::Pairing.timeout_kind().code(), 1013);
        assert_eq!(Operation::Wifi.timeout_kind().code(), 1031);
        assert_eq!(Operation::Wifi.failure_kind().code(), 1030);
        assert_eq!(Operation::KeyTransfer.failure_kind().code(), 1050);
        assert_eq!(Operation::Pairing.cancelled_kind(), Some(ErrorKind::PairingCancelled));
        assert_eq!(Operation::KeyTransfer.cancelled_kind(), None);
        assert_eq!(Operation::KeyTransfer.to_string(), "keyTransfer");
        assert_eq!(Operation::RecordSync.failure_kind().code(), 1050);
        assert_eq!(Operation::RecordSync.timeout_kind().code(), 1050);
        assert_eq!(Operation::LockCommand.cancelled_kind(), None);
    }

    #[test]
    fn failed_terminal_per_session_kind() {
        let record = ErrorRecord::from_kind(ErrorKind::TransportInternal);
        for operation in [
            Operation::Pairing,
            Operation::Wifi,
            Operation::KeyTransfer,
            Operation::RecordSync,
        ] {
            let event = BridgeEvent::failed(operation, "AA:BB", record.clone()).unwrap();
            assert!(event.is_terminal());
            assert_eq!(event.operation(), Some(operation));
            assert_eq!(event.outcome(), Some(Outcome::Failed));
            assert_eq!(event.error(), Some(&record));
        }
        assert!(BridgeEvent::failed(Operation::LockCommand, "AA:BB", record).is_none());
    }

    #[test]
    fn record_sync_result_wire_shape() {
        let event = BridgeEvent::RecordSyncResult {
            device_id: "AA:BB".into(),
            success: true,
            outcome: Outcome::Succeeded,
            total: Some(0),
            items: Some(Vec::new()),
            error: None,
        };
        assert_eq!(event.operation(), Some(Operation::RecordSync));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "recordSyncResult",
                "deviceId": "AA:BB",
                "success": true,
                "outcome": "succeeded",
                "total": 0,
                "items": []
            })
        );
    }

    #[test]
    fn progress_fraction_is_exact_at_completion() {
        assert_eq!(KeyTransferUpdate::new(5, 5, 900, 900).progress, 1.0);
        assert!((KeyTransferUpdate::new(2, 5, 360, 900).progress - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn pairing_progress_wire_shape() {
        let event = BridgeEvent::PairingProgress {
            device_id: "AA:BB".into(),
            status: PairingPhase::Authenticating,
        };
        assert_eq!(event.kind(), EventKind::Status);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "pairingProgress", "deviceId": "AA:BB", "status": "authenticating" })
        );
    }

    #[test]
    fn key_progress_flattens_update() {
        let event = BridgeEvent::KeyTransferProgress {
            device_id: "AA:BB".into(),
            phase: KeyTransferPhase::Sending,
            update: KeyTransferUpdate::new(1, 2, 180, 200),
        };
        assert_eq!(event.kind(), EventKind::Progress);
        assert_eq!(event.operation(), Some(Operation::KeyTransfer));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "keyTransferProgress",
                "deviceId": "AA:BB",
                "phase": "sending",
                "chunksSent": 1,
                "totalChunks": 2,
                "bytesSent": 180,
                "totalBytes": 200,
                "progress": 0.9
            })
        );
    }

    #[test]
    fn cancelled_wifi_result_has_no_error() {
        let event = BridgeEvent::WifiResult {
            device_id: "AA:BB".into(),
            success: false,
            outcome: Outcome::Cancelled,
            error: None,
        };
        assert!(event.is_terminal());
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "wifiResult", "deviceId": "AA:BB", "success": false, "outcome": "cancelled" })
        );
    }

    #[test]
    fn radio_state_event_has_no_operation() {
        let event = BridgeEvent::BluetoothState {
            state: RadioState::Off,
        };
        assert_eq!(event.operation(), None);
        assert_eq!(event.device_id(), None);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "bluetoothState", "state": "off" })
        );
    }
}
