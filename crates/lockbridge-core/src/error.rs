// ── Core error types ──
//
// User-facing errors from lockbridge-core. Hosts never see vendor status
// bytes or SDK exception text directly: every failure is classified into
// an `ErrorKind` whose numeric code is shared with the mobile plugins.
// The transport-level cause survives only as optional `details`.

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::event::Operation;
use crate::radio::RadioState;
use crate::transport::TransportError;

// ── ErrorKind ───────────────────────────────────────────────────────

/// Canonical error taxonomy.
///
/// Codes live in `1000..=1999` and are partitioned by concern; they must
/// match the Android and iOS plugins exactly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr,
)]
pub enum ErrorKind {
    // 1001–1004 radio / permission
    RadioUnavailable,
    ScanAlreadyRunning,
    RadioOff,
    PermissionDenied,
    // 1010–1013 pairing
    DeviceNotFound,
    PairingFailed,
    PairingCancelled,
    PairingTimeout,
    // 1020–1021 registration / network
    RegistrationFailed,
    NetworkError,
    // 1030–1032 WiFi
    WifiConfigFailed,
    WifiConfigTimeout,
    InvalidSsid,
    // 1040 parameters
    InvalidParameters,
    // 1050 SDK internal
    TransportInternal,
    // 1099
    Unknown,
}

impl ErrorKind {
    pub const fn code(self) -> u16 {
        match self {
            Self::RadioUnavailable => 1001,
            Self::ScanAlreadyRunning => 1002,
            Self::RadioOff => 1003,
            Self::PermissionDenied => 1004,
            Self::DeviceNotFound => 1010,
            Self::PairingFailed => 1011,
            Self::PairingCancelled => 1012,
            Self::PairingTimeout => 1013,
            Self::RegistrationFailed => 1020,
            Self::NetworkError => 1021,
            Self::WifiConfigFailed => 1030,
            Self::WifiConfigTimeout => 1031,
            Self::InvalidSsid => 1032,
            Self::InvalidParameters => 1040,
            Self::TransportInternal => 1050,
            Self::Unknown => 1099,
        }
    }

    /// Reverse lookup used when a host echoes a code back.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1001 => Self::RadioUnavailable,
            1002 => Self::ScanAlreadyRunning,
            1003 => Self::RadioOff,
            1004 => Self::PermissionDenied,
            1010 => Self::DeviceNotFound,
            1011 => Self::PairingFailed,
            1012 => Self::PairingCancelled,
            1013 => Self::PairingTimeout,
            1020 => Self::RegistrationFailed,
            1021 => Self::NetworkError,
            1030 => Self::WifiConfigFailed,
            1031 => Self::WifiConfigTimeout,
            1032 => Self::InvalidSsid,
            1040 => Self::InvalidParameters,
            1050 => Self::TransportInternal,
            1099 => Self::Unknown,
            _ => return None,
        })
    }

    /// Default human-readable message for the kind.
    pub const fn message(self) -> &'static str {
        match self {
            Self::RadioUnavailable => "Bluetooth is not available on this device",
            Self::ScanAlreadyRunning => "A device scan is already running",
            Self::RadioOff => "Bluetooth is turned off",
            Self::PermissionDenied => "Bluetooth permission denied",
            Self::DeviceNotFound => "Device not found",
            Self::PairingFailed => "Failed to pair with device",
            Self::PairingCancelled => "Pairing was cancelled",
            Self::PairingTimeout => "Pairing timed out",
            Self::RegistrationFailed => "Device registration failed",
            Self::NetworkError => "Network error",
            Self::WifiConfigFailed => "WiFi configuration failed",
            Self::WifiConfigTimeout => "WiFi configuration timed out",
            Self::InvalidSsid => "Invalid WiFi SSID",
            Self::InvalidParameters => "Invalid parameters",
            Self::TransportInternal => "Bluetooth SDK error",
            Self::Unknown => "Unknown error",
        }
    }
}

// ── ErrorRecord ─────────────────────────────────────────────────────

/// Wire shape of an error: `{code, message, details?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorRecord {
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            code: kind.code(),
            message: kind.message().to_owned(),
            details: None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code)
    }
}

impl From<&CoreError> for ErrorRecord {
    fn from(err: &CoreError) -> Self {
        err.to_record()
    }
}

// ── CoreError ───────────────────────────────────────────────────────

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Radio errors ─────────────────────────────────────────────────
    #[error("Bluetooth is turned off")]
    RadioOff,

    #[error("Bluetooth is not available (state: {state})")]
    RadioUnavailable { state: RadioState },

    #[error("Bluetooth permission denied")]
    PermissionDenied,

    // ── Validation errors ────────────────────────────────────────────
    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("SSID must not be empty")]
    InvalidSsid,

    #[error("unknown method: {method}")]
    UnknownMethod { method: String },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Device not found: {identifier} has not been paired")]
    DeviceNotFound { identifier: String },

    #[error("{} already in progress", .operation.label())]
    AlreadyRunning { operation: Operation },

    #[error("{} timed out after {timeout_secs}s", .operation.label())]
    Timeout {
        operation: Operation,
        timeout_secs: u64,
    },

    /// The session's own driver failed, not the lock.
    #[error("{} interrupted: {reason}", .operation.label())]
    Interrupted {
        operation: Operation,
        reason: String,
    },

    // ── Transport errors (wrapped, not exposed raw) ──────────────────
    #[error("{} failed: {source}", .operation.label())]
    Transport {
        operation: Operation,
        #[source]
        source: TransportError,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure was a deadline expiring rather than a rejection.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Transport {
                    source: TransportError::Timeout,
                    ..
                }
        )
    }

    /// Classify into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RadioOff => ErrorKind::RadioOff,
            Self::RadioUnavailable { .. } => ErrorKind::RadioUnavailable,
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::InvalidParameter { .. } | Self::UnknownMethod { .. } => {
                ErrorKind::InvalidParameters
            }
            Self::InvalidSsid => ErrorKind::InvalidSsid,
            Self::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Self::AlreadyRunning { operation } | Self::Interrupted { operation, .. } => {
                operation.failure_kind()
            }
            Self::Timeout { operation, .. } => operation.timeout_kind(),
            Self::Transport { operation, source } => match source {
                TransportError::Timeout => operation.timeout_kind(),
                _ => operation.failure_kind(),
            },
            Self::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// Build the wire payload, keeping the transport cause as `details`.
    pub fn to_record(&self) -> ErrorRecord {
        let details = match self {
            Self::InvalidParameter { field, .. } => Some(json!({ "field": field })),
            Self::UnknownMethod { method } => Some(json!({ "method": method })),
            Self::DeviceNotFound { identifier } => Some(json!({ "deviceId": identifier })),
            Self::RadioUnavailable { state } => Some(json!({ "state": state })),
            Self::Transport { source, .. } => Some(source.details()),
            _ => None,
        };

        ErrorRecord {
            code: self.kind().code(),
            message: self.to_string(),
            details,
        }
    }
}
