// ── Lock transport boundary ──
//
// The radio link and the vendor frame protocol live outside this crate.
// Orchestrators drive a `LockTransport` trait object; the host (or the
// simulated transport in the binary) supplies the implementation.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::SecretString;
use serde_json::{Value, json};
use thiserror::Error;

use crate::model::{
    AuthMaterial, Cat1Info, DnaInfo, KeyType, KeyValidity, MacAddress, NbIotInfo, RecordPage,
    RecordQuery, SysParam,
};

/// Largest frame payload the lock firmware accepts in one write.
pub const DEFAULT_FRAME_PAYLOAD: usize = 180;

// ── AckStatus ───────────────────────────────────────────────────────

macro_rules! ack_statuses {
    ($( $variant:ident = $code:literal => $desc:literal, )+) => {
        /// Acknowledgment status reported by the lock firmware.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum AckStatus {
            $( $variant, )+
            Other(u16),
        }

        impl AckStatus {
            pub const fn from_code(code: u16) -> Self {
                match code {
                    $( $code => Self::$variant, )+
                    other => Self::Other(other),
                }
            }

            pub const fn code(self) -> u16 {
                match self {
                    $( Self::$variant => $code, )+
                    Self::Other(code) => code,
                }
            }

            fn known_description(self) -> Option<&'static str> {
                match self {
                    $( Self::$variant => Some($desc), )+
                    Self::Other(_) => None,
                }
            }
        }
    };
}

ack_statuses! {
    Success = 0x01 => "Operation successful",
    PasswordError = 0x02 => "Password error",
    RemoteNotAllowed = 0x03 => "Remote unlocking not enabled",
    ParamError = 0x04 => "Parameter error",
    OperationNotAllowed = 0x05 => "Operation prohibited (add administrator first)",
    Unsupported = 0x06 => "Operation not supported by lock",
    DuplicateKey = 0x07 => "Repeat adding (already exists)",
    IndexError = 0x08 => "Index/number error",
    UnlockNotAllowed = 0x09 => "Reverse locking not allowed",
    SystemLocked = 0x0A => "System is locked",
    AdminDeleteRefused = 0x0B => "Prohibit deleting administrators",
    StorageFull = 0x0E => "Storage full",
    MorePacketsFollow = 0x0F => "Follow-up data packets available",
    Next = 0x10 => "Door locked, cannot open/unlock",
    EnrollmentExited = 0x11 => "Exit and add key status",
    RfBusy = 0x23 => "RF module busy",
    Unlocking = 0x2B => "Electronic lock engaged (unlock not allowed)",
    AuthErr = 0xE1 => "Authentication failed",
    Busy = 0xE2 => "Device busy, try again later",
    EncryptionTypeError = 0xE4 => "Incorrect encryption type",
    SessionIdError = 0xE5 => "Session ID incorrect",
    NotPairing = 0xE6 => "Device not in pairing mode",
    CommandNotAllowed = 0xE7 => "Command not allowed",
    PairingError = 0xE8 => "Please add the device first (pairing error)",
    AlreadyPaired = 0xEA => "Already has permission (pair repeat)",
    InsufficientPermission = 0xEB => "Insufficient permissions",
    InvalidCommandVersion = 0xEC => "Invalid command version / protocol mismatch",
    DnaMissing = 0xFF00 => "DNA key empty",
    SessionIdMissing = 0xFF01 => "Session ID empty",
    AesKeyMissing = 0xFF02 => "AES key empty",
    AuthCodeMissing = 0xFF03 => "Authentication code empty",
    ScanTimeout = 0xFF04 => "Scan/connection timeout",
    LinkLost = 0xFF05 => "Bluetooth disconnected",
    DecryptionFailed = 0xFF07 => "Decryption failed",
}

impl AckStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    pub fn description(self) -> String {
        match self.known_description() {
            Some(desc) => desc.to_owned(),
            None => format!("Unknown status code: 0x{:X}", self.code()),
        }
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:X})", self.description(), self.code())
    }
}

// ── TransportError ──────────────────────────────────────────────────

/// Failure reported by the transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("link disconnected")]
    Disconnected,

    #[error("transport timed out")]
    Timeout,

    #[error("lock rejected request: {0}")]
    Status(AckStatus),

    #[error("SDK failure: {0}")]
    Sdk(String),
}

impl TransportError {
    /// Map a raw acknowledgment code, treating `Success` as `Ok`.
    pub fn check(code: u16) -> Result<(), Self> {
        let status = AckStatus::from_code(code);
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::Status(status))
        }
    }

    /// Diagnostic payload carried in an error record's `details`.
    pub fn details(&self) -> Value {
        match self {
            Self::Status(status) => json!({
                "transportStatus": status.code(),
                "ackMessage": status.description(),
            }),
            other => json!({ "cause": other.to_string() }),
        }
    }
}

// ── Frames ──────────────────────────────────────────────────────────

/// Credentials pushed during WiFi provisioning.
#[derive(Debug, Clone)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: SecretString,
    /// Opaque vendor configuration type.
    pub wifi_type: i64,
}

/// One fragment of a key payload.
///
/// Frames carry no index: the firmware reassembles by arrival order, so
/// fragments must be delivered strictly one after another.
#[derive(Debug, Clone)]
pub struct KeyChunk {
    pub key_type: KeyType,
    pub key_group_id: u16,
    pub validity: KeyValidity,
    pub total_len: usize,
    pub total_chunks: usize,
    pub is_last: bool,
    pub data: Bytes,
}

/// Acknowledgment for one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkAck {
    pub lock_key_id: u16,
    /// Set on the final fragment when the lock is still validating the key.
    pub awaiting_confirmation: bool,
}

// ── LockTransport ───────────────────────────────────────────────────

/// Capability surface of the radio link to a lock.
///
/// Implementations must make `abort` and `disconnect` return promptly;
/// they are invoked on cancellation paths.
#[async_trait]
pub trait LockTransport: Send + Sync + 'static {
    async fn connect(&self, mac: &MacAddress) -> Result<(), TransportError>;

    async fn disconnect(&self, mac: &MacAddress);

    /// Abandon whatever exchange is in flight with `mac`.
    async fn abort(&self, mac: &MacAddress);

    /// Add-device exchange: reads the lock's DNA record.
    async fn add_device(&self, mac: &MacAddress, chip_type: u8)
    -> Result<DnaInfo, TransportError>;

    async fn get_sys_param(&self, auth: &AuthMaterial) -> Result<SysParam, TransportError>;

    async fn pair_success_ind(&self, auth: &AuthMaterial) -> Result<(), TransportError>;

    async fn rf_module_pairing(&self, auth: &AuthMaterial) -> Result<(), TransportError>;

    async fn register_wifi(
        &self,
        auth: &AuthMaterial,
        credentials: &WifiCredentials,
    ) -> Result<(), TransportError>;

    fn max_frame_payload(&self) -> usize {
        DEFAULT_FRAME_PAYLOAD
    }

    async fn send_key_chunk(
        &self,
        auth: &AuthMaterial,
        chunk: &KeyChunk,
    ) -> Result<ChunkAck, TransportError>;

    /// Wait for the lock to confirm a key whose final fragment was
    /// acknowledged as pending. Returns the assigned lock key id.
    async fn await_key_confirmation(&self, auth: &AuthMaterial) -> Result<u16, TransportError>;

    // ── One-shot lock commands ───────────────────────────────────────

    async fn open_lock(&self, auth: &AuthMaterial) -> Result<(), TransportError>;

    async fn close_lock(&self, auth: &AuthMaterial) -> Result<(), TransportError>;

    /// Factory-reset the lock's pairing. Its credentials are void afterwards.
    async fn delete_lock(&self, auth: &AuthMaterial) -> Result<(), TransportError>;

    /// Re-read the identity record of an already paired lock.
    async fn get_dna(&self, auth: &AuthMaterial) -> Result<DnaInfo, TransportError>;

    /// Hotel-mode parameter: how long before a key expires the lock warns.
    async fn set_key_expiration_alarm(
        &self,
        _auth: &AuthMaterial,
        _time: u32,
    ) -> Result<(), TransportError> {
        Err(TransportError::Status(AckStatus::Unsupported))
    }

    async fn nb_iot_info(&self, _auth: &AuthMaterial) -> Result<NbIotInfo, TransportError> {
        Err(TransportError::Status(AckStatus::Unsupported))
    }

    async fn cat1_info(&self, _auth: &AuthMaterial) -> Result<Cat1Info, TransportError> {
        Err(TransportError::Status(AckStatus::Unsupported))
    }

    // ── Journal ──────────────────────────────────────────────────────

    /// Number of entries in the lock's journal.
    async fn record_count(&self, auth: &AuthMaterial) -> Result<usize, TransportError>;

    async fn read_records(
        &self,
        auth: &AuthMaterial,
        query: &RecordQuery,
    ) -> Result<RecordPage, TransportError>;
}
