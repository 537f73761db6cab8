//! Session orchestration for BLE smart locks.
//!
//! This crate owns the stateful, cancellable, timeout-bound operations a
//! host application runs against a lock over an unreliable radio link:
//!
//! - **[`Bridge`]** — Facade that owns the shared collaborators and routes
//!   host [`Command`]s to the orchestrators. Session-starting commands
//!   resolve at acceptance; outcomes arrive as [`BridgeEvent`]s.
//!
//! - **Orchestrators** ([`orchestrator`]) — [`PairingOrchestrator`],
//!   [`WifiProvisioningOrchestrator`], [`KeyTransferOrchestrator`] and
//!   [`RecordSyncOrchestrator`]. Each keeps at most one live session; every
//!   session emits exactly one terminal event, whichever of cancellation,
//!   timeout or protocol completion comes first.
//!
//! - **[`LockControl`]** — One-shot commands against a paired lock (open,
//!   close, delete, identity and modem reads, single journal pages).
//!
//! - **[`EventStream`]** — Single-listener delivery in emission order.
//!
//! - **[`AuthCache`]** — Case-insensitive credential cache filled by pairing
//!   and read by WiFi provisioning and key transfer.
//!
//! - **[`LockTransport`]** — The radio link, supplied by the embedder.
//!
//! - **Errors** ([`error`]) — [`CoreError`] classified into the shared
//!   numeric taxonomy ([`ErrorKind`]) that hosts see as [`ErrorRecord`]s.

pub mod auth_cache;
pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod orchestrator;
pub mod radio;
pub mod session;
pub mod stream;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth_cache::AuthCache;
pub use bridge::Bridge;
pub use command::{Command, CommandResult};
pub use config::BridgeConfig;
pub use error::{CoreError, ErrorKind, ErrorRecord};
pub use event::{
    BridgeEvent, EventKind, KeyTransferPhase, KeyTransferUpdate, Operation, Outcome,
    PairingPhase, RecordSyncPhase, WifiPhase,
};
pub use orchestrator::{
    KeyTransferOrchestrator, KeyTransferRequest, LockControl, PairRequest, PairingOrchestrator,
    ProgressCallback, RecordSyncOrchestrator, RecordSyncRequest, WifiProvisioningOrchestrator,
    WifiRequest,
};
pub use radio::{RadioState, StateMonitor};
pub use session::SessionInfo;
pub use stream::{EventReceiver, EventReceiverStream, EventStream};
pub use transport::{AckStatus, ChunkAck, KeyChunk, LockTransport, TransportError, WifiCredentials};

pub use model::{
    AuthMaterial, Cat1Info, Device, DeviceInfo, DeviceType, DnaInfo, EnrolledKey, KeyType,
    KeyValidity, LockRecord, LogVersion, MacAddress, NbIotInfo, RecordPage, RecordQuery,
    RecordWindow, RfModuleType, SysParam,
};
