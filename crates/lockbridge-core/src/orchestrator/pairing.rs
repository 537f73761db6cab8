// ── Pairing ──
//
// Connect, authenticate (host token or add-device exchange), verify with a
// system-parameter read and confirm pairing to the lock. Successful
// sessions leave their credentials in the auth cache.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Context, Settled, race};
use crate::error::CoreError;
use crate::event::{BridgeEvent, Operation, PairingPhase};
use crate::model::{AuthMaterial, Device, DeviceInfo, MacAddress};
use crate::session::{SessionInfo, SessionSlot, SessionTicket};
use crate::transport::{LockTransport, TransportError};

#[derive(Debug, Clone)]
pub struct PairRequest {
    pub device_id: MacAddress,
    /// Credentials from an earlier pairing; skips the add-device exchange.
    pub auth_token: Option<SecretString>,
    pub device_name: Option<String>,
    pub chip_type: Option<u8>,
}

impl PairRequest {
    pub fn new(device_id: impl Into<MacAddress>) -> Self {
        Self {
            device_id: device_id.into(),
            auth_token: None,
            device_name: None,
            chip_type: None,
        }
    }
}

#[derive(Clone)]
pub struct PairingOrchestrator {
    ctx: Arc<Context>,
    slot: Arc<SessionSlot<PairingPhase>>,
    last_connected: Arc<ArcSwapOption<MacAddress>>,
}

impl PairingOrchestrator {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self {
            slot: SessionSlot::new(Operation::Pairing, Arc::clone(&ctx.events)),
            ctx,
            last_connected: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Start pairing and return the session id. Progress and the outcome
    /// arrive as events. Must be called from within a tokio runtime.
    pub fn pair(&self, request: PairRequest) -> Result<Uuid, CoreError> {
        if self.slot.is_active() {
            return Err(CoreError::AlreadyRunning {
                operation: Operation::Pairing,
            });
        }
        self.ctx.radio.ensure_ready()?;
        if request.device_id.is_empty() {
            return Err(CoreError::invalid("deviceId", "must not be empty"));
        }

        let ticket = self.slot.occupy(request.device_id.clone())?;
        let session_id = ticket.id();
        info!(%session_id, device = %request.device_id, "pairing started");
        tokio::spawn(self.clone().drive(ticket, request));
        Ok(session_id)
    }

    /// Cancel any live pairing, wait for its terminal event, then start.
    pub async fn pair_superseding(&self, request: PairRequest) -> Result<Uuid, CoreError> {
        self.slot.supersede().await;
        self.pair(request)
    }

    /// Returns `true` if a live session was asked to stop.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    pub fn is_pairing(&self) -> bool {
        self.slot.is_active()
    }

    pub fn session(&self) -> Option<SessionInfo<PairingPhase>> {
        self.slot.info()
    }

    /// Identifier of the last successfully paired lock, as the caller spelled it.
    pub fn last_connected_mac(&self) -> Option<String> {
        self.last_connected
            .load_full()
            .map(|mac| mac.as_str().to_owned())
    }

    // ── Driver ───────────────────────────────────────────────────────

    async fn drive(self, ticket: SessionTicket<PairingPhase>, request: PairRequest) {
        let deadline = Some(self.ctx.config.pairing_timeout);
        let resolution = race(ticket.cancel_token(), deadline, self.handshake(&ticket, &request)).await;
        let settled = Settled::new(Operation::Pairing, deadline, resolution);

        // Every outcome releases the link; abort tears it down itself.
        let device = ticket.device();
        if settled.needs_abort() {
            self.ctx.transport.abort(device).await;
        } else {
            self.ctx.transport.disconnect(device).await;
        }

        match (&settled.error, settled.succeeded()) {
            (_, true) => info!(session_id = %ticket.id(), %device, "pairing succeeded"),
            (Some(error), false) => warn!(
                session_id = %ticket.id(),
                %device,
                outcome = %settled.outcome,
                code = error.code,
                error = %error.message,
                "pairing ended"
            ),
            (None, false) => info!(session_id = %ticket.id(), outcome = %settled.outcome, "pairing ended"),
        }

        let event = BridgeEvent::PairingResult {
            device_id: device.as_str().to_owned(),
            success: settled.succeeded(),
            outcome: settled.outcome,
            device_info: settled.value,
            error: settled.error,
        };
        let events = Arc::clone(&self.ctx.events);
        ticket.finish(move || events.emit(event));
    }

    fn enter(&self, ticket: &SessionTicket<PairingPhase>, phase: PairingPhase) {
        ticket.set_phase(phase);
        debug!(session_id = %ticket.id(), %phase, "pairing phase");
        self.ctx.events.emit(BridgeEvent::PairingProgress {
            device_id: ticket.device().as_str().to_owned(),
            status: phase,
        });
    }

    async fn handshake(
        &self,
        ticket: &SessionTicket<PairingPhase>,
        request: &PairRequest,
    ) -> Result<DeviceInfo, CoreError> {
        let transport = &self.ctx.transport;
        let device = &request.device_id;
        let target = Device::from_id(device.clone(), request.device_name.clone());
        let failed = |source: TransportError| CoreError::Transport {
            operation: Operation::Pairing,
            source,
        };

        self.enter(ticket, PairingPhase::Connecting);
        transport.connect(device).await.map_err(failed)?;

        self.enter(ticket, PairingPhase::Authenticating);
        let (material, dna) = match &request.auth_token {
            Some(token) => (
                AuthMaterial::from_token(device.clone(), token.expose_secret()),
                None,
            ),
            None => {
                let chip_type = request.chip_type.unwrap_or(self.ctx.config.chip_type);
                let dna = transport
                    .add_device(device, chip_type)
                    .await
                    .map_err(failed)?;
                (AuthMaterial::from_dna(device.clone(), &dna), Some(dna))
            }
        };

        let sys_param = transport.get_sys_param(&material).await.map_err(failed)?;
        transport.pair_success_ind(&material).await.map_err(failed)?;
        spawn_rf_module_pairing(Arc::clone(transport), material.clone());

        let info = DeviceInfo::new(&target, dna.as_ref(), Some(sys_param));
        self.ctx.auth.set(device, material);
        self.last_connected.store(Some(Arc::new(device.clone())));
        Ok(info)
    }
}

/// RF-module pairing is best effort and never fails the session.
pub(super) fn spawn_rf_module_pairing(transport: Arc<dyn LockTransport>, material: AuthMaterial) {
    tokio::spawn(async move {
        match transport.rf_module_pairing(&material).await {
            Ok(()) => debug!(device = %material.mac, "rf module paired"),
            Err(e) => warn!(device = %material.mac, error = %e, "rf module pairing failed (non-fatal)"),
        }
    });
}
