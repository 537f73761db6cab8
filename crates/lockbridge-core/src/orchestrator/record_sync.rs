// ── Journal sync ──
//
// Reads the lock's whole operation journal page by page. Each non-empty
// page is forwarded as it arrives; the terminal event carries everything
// read. The sync ends when the lock says nothing follows, the reported
// total is reached, or a page comes back empty.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Context, Settled, exchange, race, stop_if_cancelled};
use crate::error::CoreError;
use crate::event::{BridgeEvent, Operation, RecordSyncPhase};
use crate::model::{
    AuthMaterial, DEFAULT_RECORD_PAGE_SIZE, LockRecord, LogVersion, MacAddress, RecordQuery,
};
use crate::session::{SessionInfo, SessionSlot, SessionTicket};

#[derive(Debug, Clone)]
pub struct RecordSyncRequest {
    pub device_id: MacAddress,
    pub log_version: LogVersion,
    pub page_size: usize,
}

impl RecordSyncRequest {
    pub fn new(device_id: impl Into<MacAddress>) -> Self {
        Self {
            device_id: device_id.into(),
            log_version: LogVersion::default(),
            page_size: DEFAULT_RECORD_PAGE_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct RecordSyncOrchestrator {
    ctx: Arc<Context>,
    slot: Arc<SessionSlot<RecordSyncPhase>>,
}

impl RecordSyncOrchestrator {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self {
            slot: SessionSlot::new(Operation::RecordSync, Arc::clone(&ctx.events)),
            ctx,
        }
    }

    pub fn start(&self, request: RecordSyncRequest) -> Result<Uuid, CoreError> {
        if self.slot.is_active() {
            return Err(CoreError::AlreadyRunning {
                operation: Operation::RecordSync,
            });
        }
        if request.page_size == 0 {
            return Err(CoreError::invalid("readCnt", "must be greater than zero"));
        }
        let material = self.ctx.material(&request.device_id)?;
        self.ctx.radio.ensure_ready()?;

        let ticket = self.slot.occupy(request.device_id.clone())?;
        let session_id = ticket.id();
        info!(
            %session_id,
            device = %request.device_id,
            log_version = %request.log_version,
            page_size = request.page_size,
            "record sync started"
        );
        tokio::spawn(self.clone().drive(ticket, material, request));
        Ok(session_id)
    }

    pub async fn start_superseding(&self, request: RecordSyncRequest) -> Result<Uuid, CoreError> {
        self.slot.supersede().await;
        self.start(request)
    }

    /// Stop after the page currently in flight.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    pub fn is_syncing(&self) -> bool {
        self.slot.is_active()
    }

    pub fn session(&self) -> Option<SessionInfo<RecordSyncPhase>> {
        self.slot.info()
    }

    // ── Driver ───────────────────────────────────────────────────────

    async fn drive(
        self,
        ticket: SessionTicket<RecordSyncPhase>,
        material: Arc<AuthMaterial>,
        request: RecordSyncRequest,
    ) {
        let work = self.read_all(&ticket, &material, &request);
        let resolution = race(ticket.cancel_token(), None, work).await;
        let settled = Settled::new(Operation::RecordSync, None, resolution);

        let device = ticket.device();
        if settled.needs_abort() {
            self.ctx.transport.abort(device).await;
        } else {
            self.ctx.transport.disconnect(device).await;
        }
        match &settled.error {
            Some(error) => warn!(
                session_id = %ticket.id(),
                %device,
                outcome = %settled.outcome,
                code = error.code,
                error = %error.message,
                "record sync ended"
            ),
            None => info!(
                session_id = %ticket.id(),
                %device,
                outcome = %settled.outcome,
                records = settled.value.as_ref().map_or(0, Vec::len),
                "record sync ended"
            ),
        }

        let event = BridgeEvent::RecordSyncResult {
            device_id: device.as_str().to_owned(),
            success: settled.succeeded(),
            outcome: settled.outcome,
            total: settled.value.as_ref().map(Vec::len),
            items: settled.value,
            error: settled.error,
        };
        let events = Arc::clone(&self.ctx.events);
        ticket.finish(move || events.emit(event));
    }

    async fn read_all(
        &self,
        ticket: &SessionTicket<RecordSyncPhase>,
        material: &AuthMaterial,
        request: &RecordSyncRequest,
    ) -> Result<Vec<LockRecord>, CoreError> {
        let transport = &self.ctx.transport;
        let ack_timeout = self.ctx.config.ack_timeout;

        ticket.set_phase(RecordSyncPhase::Counting);
        let total = exchange(Operation::RecordSync, ack_timeout, transport.record_count(material)).await?;
        debug!(session_id = %ticket.id(), total, "journal size read");

        ticket.set_phase(RecordSyncPhase::Reading);
        let mut records = Vec::new();
        let mut next = 0;
        while next < total {
            stop_if_cancelled(ticket.cancel_token()).await;

            let query = RecordQuery {
                start: next,
                count: request.page_size,
                log_version: request.log_version,
            };
            let page = exchange(
                Operation::RecordSync,
                ack_timeout,
                transport.read_records(material, &query),
            )
            .await?;
            if page.records.is_empty() {
                debug!(session_id = %ticket.id(), start = next, "lock returned an empty page");
                break;
            }

            next += page.records.len();
            records.extend(page.records.iter().cloned());
            debug!(session_id = %ticket.id(), read = records.len(), total, "journal page read");
            self.ctx.events.emit(BridgeEvent::RecordSyncProgress {
                device_id: ticket.device().as_str().to_owned(),
                items: page.records,
                total_so_far: records.len(),
                is_more: page.more_data,
            });
            if !page.more_data {
                break;
            }
        }
        Ok(records)
    }
}
