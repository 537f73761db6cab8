// ── Session orchestrators ──
//
// Each orchestrator validates a request synchronously, claims its session
// slot, and spawns a driver task. The driver races cancellation, the
// session deadline and the protocol future; whichever resolves first
// decides the single terminal event. One-shot lock commands share the
// same context but hold no slot.

pub mod key_transfer;
pub mod lock_control;
pub mod pairing;
pub mod record_sync;
pub mod wifi;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth_cache::AuthCache;
use crate::config::BridgeConfig;
use crate::error::{CoreError, ErrorRecord};
use crate::event::{Operation, Outcome};
use crate::model::{AuthMaterial, MacAddress};
use crate::radio::StateMonitor;
use crate::stream::EventStream;
use crate::transport::{LockTransport, TransportError};

pub use key_transfer::{KeyTransferOrchestrator, KeyTransferRequest, ProgressCallback};
pub use lock_control::LockControl;
pub use pairing::{PairRequest, PairingOrchestrator};
pub use record_sync::{RecordSyncOrchestrator, RecordSyncRequest};
pub use wifi::{WifiProvisioningOrchestrator, WifiRequest};

/// Collaborators shared by every orchestrator.
pub(crate) struct Context {
    pub transport: Arc<dyn LockTransport>,
    pub events: Arc<EventStream>,
    pub auth: Arc<AuthCache>,
    pub radio: Arc<StateMonitor>,
    pub config: BridgeConfig,
}

impl Context {
    /// Cached credentials for `device`, or `DeviceNotFound`.
    pub fn material(&self, device: &MacAddress) -> Result<Arc<AuthMaterial>, CoreError> {
        self.auth.get(device).ok_or_else(|| CoreError::DeviceNotFound {
            identifier: device.as_str().to_owned(),
        })
    }
}

/// One transport exchange, bounded by `limit`.
pub(crate) async fn exchange<T>(
    operation: Operation,
    limit: Duration,
    request: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, CoreError> {
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result.map_err(|source| CoreError::Transport { operation, source }),
        Err(_) => Err(CoreError::Timeout {
            operation,
            timeout_secs: limit.as_secs(),
        }),
    }
}

/// Park forever once cancelled; the driver's race resolves the session.
pub(crate) async fn stop_if_cancelled(cancel: &CancellationToken) {
    if cancel.is_cancelled() {
        std::future::pending::<()>().await;
    }
}

// ── Driver race ─────────────────────────────────────────────────────

pub(crate) enum Resolution<T> {
    Done(Result<T, CoreError>),
    Cancelled,
    TimedOut,
}

/// Run `work` until it finishes, `cancel` fires or `deadline` elapses.
pub(crate) async fn race<T>(
    cancel: &CancellationToken,
    deadline: Option<Duration>,
    work: impl Future<Output = Result<T, CoreError>>,
) -> Resolution<T> {
    let timer = async {
        match deadline {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Resolution::Cancelled,
        () = timer => Resolution::TimedOut,
        result = work => Resolution::Done(result),
    }
}

/// Terminal classification of a resolved session.
pub(crate) struct Settled<T> {
    pub outcome: Outcome,
    pub value: Option<T>,
    pub error: Option<ErrorRecord>,
}

impl<T> Settled<T> {
    pub fn new(operation: Operation, deadline: Option<Duration>, resolution: Resolution<T>) -> Self {
        match resolution {
            Resolution::Done(Ok(value)) => Self {
                outcome: Outcome::Succeeded,
                value: Some(value),
                error: None,
            },
            Resolution::Done(Err(err)) => Self {
                outcome: if err.is_timeout() {
                    Outcome::TimedOut
                } else {
                    Outcome::Failed
                },
                value: None,
                error: Some(err.to_record()),
            },
            Resolution::Cancelled => Self {
                outcome: Outcome::Cancelled,
                value: None,
                error: operation.cancelled_kind().map(ErrorRecord::from_kind),
            },
            Resolution::TimedOut => {
                let err = CoreError::Timeout {
                    operation,
                    timeout_secs: deadline.unwrap_or_default().as_secs(),
                };
                Self {
                    outcome: Outcome::TimedOut,
                    value: None,
                    error: Some(err.to_record()),
                }
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    /// Cancelled and timed-out sessions leave an exchange to abandon.
    pub fn needs_abort(&self) -> bool {
        matches!(self.outcome, Outcome::Cancelled | Outcome::TimedOut)
    }
}
