// ── Session slots ──
//
// Each orchestrator owns one slot with at most one live session. The slot
// mutex is never held across an `.await`. A session leaves the slot in
// the same critical section that emits its terminal event, so a late
// `cancel()` finds an empty slot. A ticket dropped before `finish` (its
// driver panicked) still emits a failed terminal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::CoreError;
use crate::event::{BridgeEvent, Operation};
use crate::model::MacAddress;
use crate::stream::EventStream;

/// Point-in-time view of a live session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo<P> {
    pub id: Uuid,
    pub device: MacAddress,
    pub started_at: DateTime<Utc>,
    pub phase: Option<P>,
}

struct LiveSession<P> {
    info: SessionInfo<P>,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

pub(crate) struct SessionSlot<P> {
    operation: Operation,
    events: Arc<EventStream>,
    live: Mutex<Option<LiveSession<P>>>,
}

impl<P: Copy + Send + 'static> SessionSlot<P> {
    pub(crate) fn new(operation: Operation, events: Arc<EventStream>) -> Arc<Self> {
        Arc::new(Self {
            operation,
            events,
            live: Mutex::new(None),
        })
    }

    fn live(&self) -> MutexGuard<'_, Option<LiveSession<P>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for a new session on `device`.
    pub(crate) fn occupy(self: &Arc<Self>, device: MacAddress) -> Result<SessionTicket<P>, CoreError> {
        let mut live = self.live();
        if live.is_some() {
            return Err(CoreError::AlreadyRunning {
                operation: self.operation,
            });
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        *live = Some(LiveSession {
            info: SessionInfo {
                id,
                device: device.clone(),
                started_at: Utc::now(),
                phase: None,
            },
            cancel: cancel.clone(),
            done: done_rx,
        });

        Ok(SessionTicket {
            slot: Arc::clone(self),
            id,
            device,
            cancel,
            done: Some(done_tx),
        })
    }

    pub(crate) fn is_active(&self) -> bool {
        self.live().is_some()
    }

    pub(crate) fn info(&self) -> Option<SessionInfo<P>> {
        self.live().as_ref().map(|s| s.info.clone())
    }

    /// Request cancellation of the live session. Returns `false` when the
    /// slot is empty or the session was already cancelled.
    pub(crate) fn cancel(&self) -> bool {
        let live = self.live();
        let Some(session) = live.as_ref() else {
            return false;
        };
        if session.cancel.is_cancelled() {
            return false;
        }
        session.cancel.cancel();
        debug!(
            operation = %self.operation,
            session_id = %session.info.id,
            "cancellation requested"
        );
        true
    }

    /// Cancel the live session, if any, and wait until it has emitted its
    /// terminal event.
    pub(crate) async fn supersede(&self) {
        let pending = self.live().as_ref().map(|session| {
            session.cancel.cancel();
            (session.info.id, session.done.clone())
        });
        if let Some((id, mut done)) = pending {
            debug!(operation = %self.operation, session_id = %id, "superseding session");
            // Err means the ticket is gone, which also vacated the slot.
            let _ = done.wait_for(|finished| *finished).await;
        }
    }
}

// ── SessionTicket ───────────────────────────────────────────────────

/// Ownership of a live session, held by its driver task.
pub(crate) struct SessionTicket<P: Copy + Send + 'static> {
    slot: Arc<SessionSlot<P>>,
    id: Uuid,
    device: MacAddress,
    cancel: CancellationToken,
    done: Option<watch::Sender<bool>>,
}

impl<P: Copy + Send + 'static> SessionTicket<P> {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn device(&self) -> &MacAddress {
        &self.device
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn set_phase(&self, phase: P) {
        if let Some(session) = self.slot.live().as_mut().filter(|s| s.info.id == self.id) {
            session.info.phase = Some(phase);
        }
    }

    /// Vacate the slot, running `emit` inside the same critical section.
    pub(crate) fn finish(mut self, emit: impl FnOnce()) {
        {
            let mut live = self.slot.live();
            if live.as_ref().is_some_and(|s| s.info.id == self.id) {
                *live = None;
            }
            emit();
        }
        if let Some(done) = self.done.take() {
            done.send_replace(true);
        }
    }
}

impl<P: Copy + Send + 'static> Drop for SessionTicket<P> {
    fn drop(&mut self) {
        let Some(done) = self.done.take() else {
            return;
        };
        let operation = self.slot.operation;
        error!(
            %operation,
            session_id = %self.id,
            device = %self.device,
            "session driver stopped without a terminal event"
        );
        let err = CoreError::Interrupted {
            operation,
            reason: "session driver stopped unexpectedly".into(),
        };
        {
            let mut live = self.slot.live();
            if live.as_ref().is_some_and(|s| s.info.id == self.id) {
                *live = None;
            }
            if let Some(event) = BridgeEvent::failed(operation, self.device.as_str(), err.to_record()) {
                self.slot.events.emit(event);
            }
        }
        done.send_replace(true);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::Outcome;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn slot() -> Arc<SessionSlot<u8>> {
        SessionSlot::new(Operation::Wifi, Arc::new(EventStream::new()))
    }

    #[test]
    fn second_occupant_is_rejected() {
        let slot = slot();
        let ticket = slot.occupy(MacAddress::new("aa")).unwrap();
        let err = slot.occupy(MacAddress::new("bb")).err().unwrap();
        assert!(matches!(err, CoreError::AlreadyRunning { operation: Operation::Wifi }));
        assert_eq!(slot.info().unwrap().device, MacAddress::new("aa"));
        ticket.finish(|| {});
        assert!(!slot.is_active());
    }

    #[test]
    fn terminal_emit_runs_under_slot_lock() {
        let slot = slot();
        let ticket = slot.occupy(MacAddress::new("aa")).unwrap();
        let locked = AtomicBool::new(false);
        let watched = Arc::clone(&slot);
        ticket.finish(|| locked.store(watched.live.try_lock().is_err(), Ordering::SeqCst));
        assert!(locked.load(Ordering::SeqCst));
        assert!(slot.occupy(MacAddress::new("aa")).is_ok());
    }

    #[test]
    fn cancel_is_idempotent() {
        let slot = slot();
        assert!(!slot.cancel());
        let ticket = slot.occupy(MacAddress::new("aa")).unwrap();
        assert!(slot.cancel());
        assert!(!slot.cancel());
        assert!(ticket.cancel_token().is_cancelled());
    }

    #[test]
    fn phase_updates_are_visible() {
        let slot = slot();
        let ticket = slot.occupy(MacAddress::new("aa")).unwrap();
        assert_eq!(slot.info().unwrap().phase, None);
        ticket.set_phase(3);
        assert_eq!(slot.info().unwrap().phase, Some(3));
    }

    #[test]
    fn dropped_ticket_vacates_slot_and_reports_failure() {
        let slot = slot();
        let mut rx = slot.events.attach();
        drop(slot.occupy(MacAddress::new("aa")).unwrap());
        assert!(!slot.is_active());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.outcome(), Some(Outcome::Failed));
        assert_eq!(event.device_id(), Some("aa"));
        let error = event.error().unwrap();
        assert_eq!(error.code, 1030);
        assert_eq!(error.message, "WiFi configuration interrupted: session driver stopped unexpectedly");
    }

    #[test]
    fn finished_ticket_emits_nothing_on_drop() {
        let slot = slot();
        let mut rx = slot.events.attach();
        slot.occupy(MacAddress::new("aa")).unwrap().finish(|| {});
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn supersede_waits_for_finish() {
        let slot = slot();
        let ticket = slot.occupy(MacAddress::new("aa")).unwrap();
        let token = ticket.cancel_token().clone();

        let driver = tokio::spawn(async move {
            token.cancelled().await;
            ticket.finish(|| {});
        });

        slot.supersede().await;
        assert!(!slot.is_active());
        driver.await.unwrap();
    }
}
