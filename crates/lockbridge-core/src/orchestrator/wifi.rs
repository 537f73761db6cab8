// ── WiFi provisioning ──

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Context, Settled, race};
use crate::error::CoreError;
use crate::event::{BridgeEvent, Operation, WifiPhase};
use crate::model::{AuthMaterial, MacAddress};
use crate::session::{SessionInfo, SessionSlot, SessionTicket};
use crate::transport::WifiCredentials;

#[derive(Debug, Clone)]
pub struct WifiRequest {
    pub device_id: MacAddress,
    pub ssid: String,
    pub password: SecretString,
    pub wifi_type: i64,
    /// Falls back to the configured default when absent.
    pub timeout: Option<Duration>,
}

/// Pushes network credentials to a lock that has already been paired.
#[derive(Clone)]
pub struct WifiProvisioningOrchestrator {
    ctx: Arc<Context>,
    slot: Arc<SessionSlot<WifiPhase>>,
}

impl WifiProvisioningOrchestrator {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self {
            slot: SessionSlot::new(Operation::Wifi, Arc::clone(&ctx.events)),
            ctx,
        }
    }

    /// Validate and start provisioning. Nothing reaches the transport when
    /// validation fails.
    pub fn configure(&self, request: WifiRequest) -> Result<Uuid, CoreError> {
        if self.slot.is_active() {
            return Err(CoreError::AlreadyRunning {
                operation: Operation::Wifi,
            });
        }
        if request.ssid.trim().is_empty() {
            return Err(CoreError::InvalidSsid);
        }
        if request.timeout.is_some_and(|t| t.is_zero()) {
            return Err(CoreError::invalid("timeout", "must be greater than zero"));
        }
        let material = self.ctx.material(&request.device_id)?;
        self.ctx.radio.ensure_ready()?;

        let ticket = self.slot.occupy(request.device_id.clone())?;
        let session_id = ticket.id();
        info!(%session_id, device = %request.device_id, ssid = %request.ssid, "wifi configuration started");
        tokio::spawn(self.clone().drive(ticket, material, request));
        Ok(session_id)
    }

    pub async fn configure_superseding(&self, request: WifiRequest) -> Result<Uuid, CoreError> {
        self.slot.supersede().await;
        self.configure(request)
    }

    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    pub fn is_configuring(&self) -> bool {
        self.slot.is_active()
    }

    pub fn session(&self) -> Option<SessionInfo<WifiPhase>> {
        self.slot.info()
    }

    async fn drive(
        self,
        ticket: SessionTicket<WifiPhase>,
        material: Arc<AuthMaterial>,
        request: WifiRequest,
    ) {
        let deadline = Some(request.timeout.unwrap_or(self.ctx.config.wifi_timeout));
        let credentials = WifiCredentials {
            ssid: request.ssid,
            password: request.password,
            wifi_type: request.wifi_type,
        };

        let work = async {
            ticket.set_phase(WifiPhase::Configuring);
            self.ctx.events.emit(BridgeEvent::WifiProgress {
                device_id: ticket.device().as_str().to_owned(),
                status: WifiPhase::Configuring,
            });
            self.ctx
                .transport
                .register_wifi(&material, &credentials)
                .await
                .map_err(|source| CoreError::Transport {
                    operation: Operation::Wifi,
                    source,
                })
        };
        let resolution = race(ticket.cancel_token(), deadline, work).await;
        let settled = Settled::new(Operation::Wifi, deadline, resolution);

        let device = ticket.device();
        if settled.needs_abort() {
            self.ctx.transport.abort(device).await;
        }
        match &settled.error {
            Some(error) => warn!(
                session_id = %ticket.id(),
                %device,
                outcome = %settled.outcome,
                code = error.code,
                error = %error.message,
                "wifi configuration ended"
            ),
            None => info!(session_id = %ticket.id(), %device, outcome = %settled.outcome, "wifi configuration ended"),
        }

        let event = BridgeEvent::WifiResult {
            device_id: device.as_str().to_owned(),
            success: settled.succeeded(),
            outcome: settled.outcome,
            error: settled.error,
        };
        let events = Arc::clone(&self.ctx.events);
        ticket.finish(move || events.emit(event));
    }
}
