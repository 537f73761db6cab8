// ── Bridge facade ──
//
// Host-facing entry point: owns the shared collaborators, the session
// orchestrators and the one-shot lock commands, routes host commands, and
// forwards radio state changes onto the event stream.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth_cache::AuthCache;
use crate::command::{Command, CommandResult};
use crate::config::BridgeConfig;
use crate::error::{CoreError, ErrorRecord};
use crate::event::BridgeEvent;
use crate::orchestrator::{
    Context, KeyTransferOrchestrator, LockControl, PairingOrchestrator, RecordSyncOrchestrator,
    WifiProvisioningOrchestrator,
};
use crate::radio::StateMonitor;
use crate::stream::{EventReceiver, EventStream};
use crate::transport::LockTransport;

/// Cheaply cloneable handle to the whole session layer.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    ctx: Arc<Context>,
    pairing: PairingOrchestrator,
    wifi: WifiProvisioningOrchestrator,
    key_transfer: KeyTransferOrchestrator,
    record_sync: RecordSyncOrchestrator,
    control: LockControl,
    cancel: CancellationToken,
}

impl Bridge {
    /// Build a bridge over `transport`, assuming the radio is on.
    pub fn new(transport: Arc<dyn LockTransport>, config: BridgeConfig) -> Self {
        Self::with_radio(transport, config, Arc::new(StateMonitor::default()))
    }

    /// Build a bridge whose radio state is fed by an external monitor.
    pub fn with_radio(
        transport: Arc<dyn LockTransport>,
        config: BridgeConfig,
        radio: Arc<StateMonitor>,
    ) -> Self {
        let ctx = Arc::new(Context {
            transport,
            events: Arc::new(EventStream::new()),
            auth: Arc::new(AuthCache::new()),
            radio,
            config,
        });
        Self {
            inner: Arc::new(BridgeInner {
                pairing: PairingOrchestrator::new(Arc::clone(&ctx)),
                wifi: WifiProvisioningOrchestrator::new(Arc::clone(&ctx)),
                key_transfer: KeyTransferOrchestrator::new(Arc::clone(&ctx)),
                record_sync: RecordSyncOrchestrator::new(Arc::clone(&ctx)),
                control: LockControl::new(Arc::clone(&ctx)),
                ctx,
                cancel: CancellationToken::new(),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.ctx.config
    }

    pub fn pairing(&self) -> &PairingOrchestrator {
        &self.inner.pairing
    }

    pub fn wifi(&self) -> &WifiProvisioningOrchestrator {
        &self.inner.wifi
    }

    pub fn key_transfer(&self) -> &KeyTransferOrchestrator {
        &self.inner.key_transfer
    }

    pub fn record_sync(&self) -> &RecordSyncOrchestrator {
        &self.inner.record_sync
    }

    pub fn control(&self) -> &LockControl {
        &self.inner.control
    }

    pub fn auth_cache(&self) -> &Arc<AuthCache> {
        &self.inner.ctx.auth
    }

    pub fn radio(&self) -> &Arc<StateMonitor> {
        &self.inner.ctx.radio
    }

    pub fn events(&self) -> &Arc<EventStream> {
        &self.inner.ctx.events
    }

    // ── Event surface ────────────────────────────────────────────────

    /// Become the single event listener, replacing any previous one.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.ctx.events.attach()
    }

    pub fn unsubscribe(&self) {
        self.inner.ctx.events.detach();
    }

    /// Spawn the task that republishes radio state changes as
    /// `bluetoothState` events. Stops on [`shutdown`](Self::shutdown).
    pub fn forward_radio_events(&self) -> JoinHandle<()> {
        let mut states = self.inner.ctx.radio.subscribe();
        let events = Arc::clone(&self.inner.ctx.events);
        let cancel = self.inner.cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow_and_update();
                        events.emit(BridgeEvent::BluetoothState { state });
                    }
                }
            }
            debug!("radio forwarder stopped");
        })
    }

    // ── Command surface ──────────────────────────────────────────────

    /// Run one command. Session-starting commands resolve once the session
    /// is accepted; the outcome arrives later as a terminal event.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        debug!(command = cmd.name(), "executing command");
        let inner = &self.inner;

        match cmd {
            Command::Pair { request, force } => {
                let session_id = if force {
                    inner.pairing.pair_superseding(request).await?
                } else {
                    inner.pairing.pair(request)?
                };
                Ok(CommandResult::Started { session_id })
            }
            Command::CancelPairing => Ok(CommandResult::Cancelled(inner.pairing.cancel())),
            Command::IsPairing => Ok(CommandResult::Flag(inner.pairing.is_pairing())),

            Command::ConfigureWifi { request, force } => {
                let session_id = if force {
                    inner.wifi.configure_superseding(request).await?
                } else {
                    inner.wifi.configure(request)?
                };
                Ok(CommandResult::Started { session_id })
            }
            Command::CancelWifiConfig => Ok(CommandResult::Cancelled(inner.wifi.cancel())),
            Command::IsConfiguringWifi => Ok(CommandResult::Flag(inner.wifi.is_configuring())),

            Command::StartKeyTransfer { request, force } => {
                let session_id = if force {
                    inner.key_transfer.start_superseding(request, None).await?
                } else {
                    inner.key_transfer.start(request, None)?
                };
                Ok(CommandResult::Started { session_id })
            }
            Command::CancelKeyTransfer => {
                Ok(CommandResult::Cancelled(inner.key_transfer.cancel()))
            }
            Command::IsTransferringKey => {
                Ok(CommandResult::Flag(inner.key_transfer.is_transferring()))
            }

            Command::SyncRecords { request, force } => {
                let session_id = if force {
                    inner.record_sync.start_superseding(request).await?
                } else {
                    inner.record_sync.start(request)?
                };
                Ok(CommandResult::Started { session_id })
            }
            Command::ReadRecordPage {
                device_id,
                log_version,
                start,
                count,
            } => inner
                .control
                .read_records(&device_id, log_version, start, count)
                .await
                .map(CommandResult::RecordWindow),
            Command::CancelRecordSync => Ok(CommandResult::Cancelled(inner.record_sync.cancel())),
            Command::IsSyncingRecords => Ok(CommandResult::Flag(inner.record_sync.is_syncing())),

            Command::OpenLock { device_id } => {
                inner.control.open(&device_id).await.map(|()| CommandResult::Done)
            }
            Command::CloseLock { device_id } => {
                inner.control.close(&device_id).await.map(|()| CommandResult::Done)
            }
            Command::DeleteLock { device_id } => {
                inner.control.delete(&device_id).await.map(|()| CommandResult::Done)
            }
            Command::ConfirmPairing { device_id } => inner
                .control
                .confirm_pairing(&device_id)
                .await
                .map(|()| CommandResult::Done),
            Command::GetDna { device_id } => inner
                .control
                .dna(&device_id)
                .await
                .map(|info| CommandResult::Dna(Box::new(info))),
            Command::SetKeyExpirationAlarm { device_id, time } => inner
                .control
                .set_key_expiration_alarm(&device_id, time)
                .await
                .map(|()| CommandResult::Done),
            Command::GetNbIotInfo { device_id } => inner
                .control
                .nb_iot_info(&device_id)
                .await
                .map(CommandResult::NbIotInfo),
            Command::GetCat1Info { device_id } => inner
                .control
                .cat1_info(&device_id)
                .await
                .map(CommandResult::Cat1Info),

            Command::GetBluetoothState => Ok(CommandResult::BluetoothState(
                inner.ctx.radio.current_state(),
            )),
            Command::ClearAuth { device_id } => {
                Ok(CommandResult::Cleared(inner.ctx.auth.clear(&device_id)))
            }
            Command::GetLastConnectedMac => Ok(CommandResult::LastConnectedMac(
                inner.pairing.last_connected_mac(),
            )),
        }
    }

    /// Parse and run a host method call, answering in wire form.
    pub async fn handle_method(&self, method: &str, args: Value) -> Result<Value, ErrorRecord> {
        let result = match Command::from_method(method, args) {
            Ok(cmd) => self.execute(cmd).await,
            Err(e) => Err(e),
        };
        result.map(|r| r.to_json()).map_err(|e| {
            warn!(method, code = e.kind().code(), error = %e, "method rejected");
            e.to_record()
        })
    }

    /// Whether any session is still live.
    pub fn is_busy(&self) -> bool {
        let inner = &self.inner;
        inner.pairing.is_pairing()
            || inner.wifi.is_configuring()
            || inner.key_transfer.is_transferring()
            || inner.record_sync.is_syncing()
    }

    /// Cancel every live session and stop background tasks.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        let cancelled = [
            inner.pairing.cancel(),
            inner.wifi.cancel(),
            inner.key_transfer.cancel(),
            inner.record_sync.cancel(),
        ];
        inner.cancel.cancel();
        info!(
            sessions_cancelled = cancelled.iter().filter(|c| **c).count(),
            "bridge shut down"
        );
    }
}
