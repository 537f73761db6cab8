// ── Biometric key transfer ──
//
// Large fingerprint/face templates are cut into frame-sized chunks and sent
// strictly one after another. The firmware reassembles by arrival order, so
// there is no resume: every transfer starts again at the first chunk.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Context, Settled, exchange, race, stop_if_cancelled};
use crate::error::CoreError;
use crate::event::{BridgeEvent, KeyTransferPhase, KeyTransferUpdate, Operation};
use crate::model::{AuthMaterial, EnrolledKey, KEY_GROUP_RANGE, KeyType, KeyValidity, MacAddress};
use crate::session::{SessionInfo, SessionSlot, SessionTicket};
use crate::transport::{ChunkAck, KeyChunk};

/// Invoked after every acknowledged chunk, on the session's driver task.
/// A panic fails the transfer.
pub type ProgressCallback = Arc<dyn Fn(&KeyTransferUpdate) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct KeyTransferRequest {
    pub device_id: MacAddress,
    pub payload_base64: String,
    pub key_group_id: i64,
    pub key_type: KeyType,
    pub validity: KeyValidity,
}

/// A request that passed validation.
struct Transfer {
    material: Arc<AuthMaterial>,
    payload: Bytes,
    key_group_id: u16,
    key_type: KeyType,
    validity: KeyValidity,
    progress: Option<ProgressCallback>,
}

#[derive(Clone)]
pub struct KeyTransferOrchestrator {
    ctx: Arc<Context>,
    slot: Arc<SessionSlot<KeyTransferPhase>>,
}

impl KeyTransferOrchestrator {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self {
            slot: SessionSlot::new(Operation::KeyTransfer, Arc::clone(&ctx.events)),
            ctx,
        }
    }

    pub fn start(
        &self,
        request: KeyTransferRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<Uuid, CoreError> {
        if self.slot.is_active() {
            return Err(CoreError::AlreadyRunning {
                operation: Operation::KeyTransfer,
            });
        }
        let key_group_id = u16::try_from(request.key_group_id)
            .ok()
            .filter(|id| KEY_GROUP_RANGE.contains(id))
            .ok_or_else(|| CoreError::invalid("keyGroupId", "must be within 900..=4095"))?;
        let payload = decode_payload(&request.payload_base64)?;
        request.validity.validate()?;
        let material = self.ctx.material(&request.device_id)?;
        self.ctx.radio.ensure_ready()?;

        let ticket = self.slot.occupy(request.device_id.clone())?;
        let session_id = ticket.id();
        info!(
            %session_id,
            device = %request.device_id,
            key_type = %request.key_type,
            key_group_id,
            bytes = payload.len(),
            "key transfer started"
        );

        let transfer = Transfer {
            material,
            payload,
            key_group_id,
            key_type: request.key_type,
            validity: request.validity,
            progress,
        };
        tokio::spawn(self.clone().drive(ticket, transfer));
        Ok(session_id)
    }

    pub async fn start_superseding(
        &self,
        request: KeyTransferRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<Uuid, CoreError> {
        self.slot.supersede().await;
        self.start(request, progress)
    }

    /// Stop after the chunk currently in flight. Safe between acks.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    pub fn is_transferring(&self) -> bool {
        self.slot.is_active()
    }

    pub fn session(&self) -> Option<SessionInfo<KeyTransferPhase>> {
        self.slot.info()
    }

    /// Fragment size for this transport and configuration.
    pub fn chunk_size(&self) -> usize {
        self.ctx
            .transport
            .max_frame_payload()
            .min(self.ctx.config.key_chunk_size)
            .max(1)
    }

    // ── Driver ───────────────────────────────────────────────────────

    async fn drive(self, ticket: SessionTicket<KeyTransferPhase>, transfer: Transfer) {
        let resolution = race(ticket.cancel_token(), None, self.send_all(&ticket, &transfer)).await;
        let settled = Settled::new(Operation::KeyTransfer, None, resolution);

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
                "key transfer ended"
            ),
            None => info!(session_id = %ticket.id(), %device, outcome = %settled.outcome, "key transfer ended"),
        }

        let succeeded = settled.succeeded();
        if succeeded {
            ticket.set_phase(KeyTransferPhase::End);
        }
        let event = BridgeEvent::KeyTransferResult {
            device_id: device.as_str().to_owned(),
            success: succeeded,
            outcome: settled.outcome,
            phase: succeeded.then_some(KeyTransferPhase::End),
            key_object: settled.value,
            error: settled.error,
        };
        let events = Arc::clone(&self.ctx.events);
        ticket.finish(move || events.emit(event));
    }

    async fn send_all(
        &self,
        ticket: &SessionTicket<KeyTransferPhase>,
        transfer: &Transfer,
    ) -> Result<EnrolledKey, CoreError> {
        let transport = &self.ctx.transport;
        let ack_timeout = self.ctx.config.ack_timeout;

        let chunk_size = self.chunk_size();
        let total_len = transfer.payload.len();
        let total_chunks = total_len.div_ceil(chunk_size);
        ticket.set_phase(KeyTransferPhase::Sending);

        let mut offset = 0;
        let mut last_ack = ChunkAck::default();
        for index in 0..total_chunks {
            stop_if_cancelled(ticket.cancel_token()).await;

            let end = (offset + chunk_size).min(total_len);
            let chunk = KeyChunk {
                key_type: transfer.key_type,
                key_group_id: transfer.key_group_id,
                validity: transfer.validity.clone(),
                total_len,
                total_chunks,
                is_last: end == total_len,
                data: transfer.payload.slice(offset..end),
            };
            last_ack = exchange(
                Operation::KeyTransfer,
                ack_timeout,
                transport.send_key_chunk(&transfer.material, &chunk),
            )
            .await?;
            offset = end;

            let update = KeyTransferUpdate::new(index + 1, total_chunks, offset, total_len);
            debug!(
                session_id = %ticket.id(),
                chunk = index + 1,
                total_chunks,
                "chunk acknowledged"
            );
            self.ctx.events.emit(BridgeEvent::KeyTransferProgress {
                device_id: ticket.device().as_str().to_owned(),
                phase: KeyTransferPhase::Sending,
                update,
            });
            if let Some(callback) = &transfer.progress {
                if catch_unwind(AssertUnwindSafe(|| callback(&update))).is_err() {
                    error!(session_id = %ticket.id(), chunk = index + 1, "progress callback panicked");
                    return Err(CoreError::Interrupted {
                        operation: Operation::KeyTransfer,
                        reason: "progress callback panicked".into(),
                    });
                }
            }
        }

        let lock_key_id = if last_ack.awaiting_confirmation {
            ticket.set_phase(KeyTransferPhase::Confirming);
            let limit = self.ctx.config.key_confirmation_timeout;
            debug!(session_id = %ticket.id(), "waiting for key confirmation");
            exchange(
                Operation::KeyTransfer,
                limit,
                transport.await_key_confirmation(&transfer.material),
            )
            .await?
        } else {
            last_ack.lock_key_id
        };

        Ok(EnrolledKey::new(
            lock_key_id,
            transfer.key_group_id,
            transfer.key_type,
            transfer.validity.clone(),
        ))
    }
}

fn decode_payload(encoded: &str) -> Result<Bytes, CoreError> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid("payload", "key data is empty"));
    }
    let decoded = STANDARD
        .decode(trimmed)
        .map_err(|e| CoreError::invalid("payload", format!("invalid base64: {e}")))?;
    if decoded.is_empty() {
        return Err(CoreError::invalid("payload", "key data is empty"));
    }
    Ok(Bytes::from(decoded))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn payload_must_be_valid_base64() {
        assert_eq!(decode_payload("AAEC").unwrap().as_ref(), &[0, 1, 2]);
        let err = decode_payload("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
        let err = decode_payload("not base64!").unwrap_err();
        assert!(err.to_string().starts_with("invalid payload: invalid base64"));
    }
}
