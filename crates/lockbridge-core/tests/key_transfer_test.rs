//! Chunked key transfer against the scripted transport.
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use common::{
    LOCK, MockTransport, Step, assert_quiet, bridge_with_config, paired_bridge, until_terminal,
};
use lockbridge_core::{
    AckStatus, BridgeConfig, BridgeEvent, ErrorKind, KeyTransferPhase, KeyTransferRequest,
    KeyTransferUpdate, KeyType, KeyValidity, MacAddress, Outcome, ProgressCallback,
    TransportError,
};
use pretty_assertions::assert_eq;

fn request(len: usize) -> KeyTransferRequest {
    let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    KeyTransferRequest {
        device_id: MacAddress::new(LOCK),
        payload_base64: STANDARD.encode(payload),
        key_group_id: 901,
        key_type: KeyType::Fingerprint,
        validity: KeyValidity::default(),
    }
}

fn fractions(events: &[BridgeEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::KeyTransferProgress {
                phase: KeyTransferPhase::Sending,
                update,
                ..
            } => Some(update.progress),
            _ => None,
        })
        .collect()
}

// ── Chunking ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sends_ceil_n_over_c_chunks_then_end() {
    let transport = MockTransport::new();
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    // 400 bytes at 180 per frame: 180 + 180 + 40.
    bridge.key_transfer().start(request(400), None).unwrap();
    let events = until_terminal(&mut rx).await;

    let progress = fractions(&events);
    assert_eq!(progress.len(), 3);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*progress.last().unwrap(), 1.0);

    let chunks = transport.chunks();
    let sizes: Vec<_> = chunks.iter().map(|c| c.data.len()).collect();
    assert_eq!(sizes, vec![180, 180, 40]);
    assert!(chunks.iter().all(|c| c.total_len == 400 && c.total_chunks == 3));
    assert!(chunks.iter().all(|c| c.key_group_id == 901));
    assert_eq!(
        chunks.iter().map(|c| c.is_last).collect::<Vec<_>>(),
        vec![false, false, true]
    );

    let BridgeEvent::KeyTransferResult {
        success,
        phase,
        key_object,
        ..
    } = events.last().unwrap()
    else {
        panic!("expected key transfer result");
    };
    assert!(*success);
    assert_eq!(*phase, Some(KeyTransferPhase::End));
    let key = key_object.as_ref().unwrap();
    assert_eq!(key.lock_key_id, 7);
    assert_eq!(key.key_group_id, 901);
    assert_eq!(key.delete_mode, 1);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_chunk_size_respects_transport_limit() {
    let transport = MockTransport::with_frame_payload(100);
    let bridge = bridge_with_config(&transport, BridgeConfig::default());
    let mac = MacAddress::new(LOCK);
    bridge.auth_cache().set(
        &mac,
        lockbridge_core::AuthMaterial::from_token(mac.clone(), "t"),
    );
    let mut rx = bridge.subscribe();

    assert_eq!(bridge.key_transfer().chunk_size(), 100);
    bridge.key_transfer().start(request(250), None).unwrap();
    let events = until_terminal(&mut rx).await;

    assert_eq!(fractions(&events).len(), 3);
    assert_eq!(transport.count(Step::SendKeyChunk), 3);
}

#[tokio::test]
async fn test_pending_confirmation_yields_confirmed_key_id() {
    let transport = MockTransport::new();
    transport.confirm_last_chunk();
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    bridge.key_transfer().start(request(180), None).unwrap();
    let events = until_terminal(&mut rx).await;

    let BridgeEvent::KeyTransferResult { key_object, .. } = events.last().unwrap() else {
        panic!("expected key transfer result");
    };
    assert_eq!(key_object.as_ref().unwrap().lock_key_id, 42);
    assert_eq!(transport.count(Step::AwaitConfirmation), 1);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_timeout_is_timed_out() {
    let transport = MockTransport::new();
    transport.confirm_last_chunk();
    transport.hang(Step::AwaitConfirmation);
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    let started = tokio::time::Instant::now();
    bridge.key_transfer().start(request(10), None).unwrap();
    let events = until_terminal(&mut rx).await;

    assert!(started.elapsed() >= Duration::from_secs(15));
    let terminal = events.last().unwrap();
    assert_eq!(terminal.outcome(), Some(Outcome::TimedOut));
    assert_eq!(terminal.error().unwrap().kind(), Some(ErrorKind::TransportInternal));
    assert_eq!(transport.count(Step::Abort), 1);
}

// ── Validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_key_group_outside_range_touches_nothing() {
    let transport = MockTransport::new();
    let bridge = paired_bridge(&transport);

    for group in [0, 899, 4096, -1, 70_000] {
        let mut req = request(10);
        req.key_group_id = group;
        let err = bridge.key_transfer().start(req, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters, "group {group}");
    }
    assert!(transport.calls().is_empty());
    assert!(!bridge.key_transfer().is_transferring());
}

#[tokio::test]
async fn test_payload_and_device_validation() {
    let transport = MockTransport::new();
    let bridge = paired_bridge(&transport);

    let mut empty = request(10);
    empty.payload_base64 = String::new();
    let err = bridge.key_transfer().start(empty, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);

    let mut garbage = request(10);
    garbage.payload_base64 = "%%%".into();
    let err = bridge.key_transfer().start(garbage, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);

    let mut stranger = request(10);
    stranger.device_id = MacAddress::new("11:22:33:44:55:66");
    let err = bridge.key_transfer().start(stranger, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceNotFound);

    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_second_transfer_is_rejected() {
    let transport = MockTransport::new();
    transport.hang(Step::SendKeyChunk);
    let bridge = paired_bridge(&transport);
    let _rx = bridge.subscribe();

    bridge.key_transfer().start(request(10), None).unwrap();
    let err = bridge.key_transfer().start(request(10), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportInternal);
    assert_eq!(err.to_string(), "key transfer already in progress");
}

#[tokio::test]
async fn test_busy_is_reported_before_second_request_is_validated() {
    let transport = MockTransport::new();
    transport.hang(Step::SendKeyChunk);
    let bridge = paired_bridge(&transport);
    let _rx = bridge.subscribe();

    bridge.key_transfer().start(request(10), None).unwrap();
    let mut stranger = request(10);
    stranger.device_id = MacAddress::new("11:22:33:44:55:66");
    stranger.key_group_id = 12;
    let err = bridge.key_transfer().start(stranger, None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransportInternal);
    assert_eq!(err.to_string(), "key transfer already in progress");
}

// ── Failure and cancellation ────────────────────────────────────────

#[tokio::test]
async fn test_chunk_failure_aborts_immediately() {
    let transport = MockTransport::new();
    transport.fail(Step::SendKeyChunk, TransportError::Status(AckStatus::StorageFull));
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    bridge.key_transfer().start(request(900), None).unwrap();
    let events = until_terminal(&mut rx).await;

    assert_eq!(transport.count(Step::SendKeyChunk), 1);
    assert!(fractions(&events).is_empty());
    let terminal = events.last().unwrap();
    assert_eq!(terminal.outcome(), Some(Outcome::Failed));
    assert_eq!(terminal.error().unwrap().code, 1050);
}

#[tokio::test]
async fn test_cancel_after_two_of_five_chunks() {
    let transport = MockTransport::new();
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    let seen: Arc<Mutex<Vec<KeyTransferUpdate>>> = Arc::default();
    let orchestrator = bridge.key_transfer().clone();
    let record = Arc::clone(&seen);
    let progress: ProgressCallback = Arc::new(move |update: &KeyTransferUpdate| {
        record.lock().unwrap().push(*update);
        if update.chunks_sent == 2 {
            assert!(orchestrator.cancel());
            assert!(!orchestrator.cancel());
        }
    });

    // 900 bytes at 180 per frame: five chunks.
    bridge.key_transfer().start(request(900), Some(progress)).unwrap();
    let events = until_terminal(&mut rx).await;

    assert_eq!(transport.count(Step::SendKeyChunk), 2);
    let progress = fractions(&events);
    assert_eq!(progress.len(), 2);
    assert!((progress[1] - 2.0 / 5.0).abs() < f64::EPSILON);

    let terminals: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].outcome(), Some(Outcome::Cancelled));
    assert!(terminals[0].error().is_none());
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_panicking_callback_fails_the_session() {
    let transport = MockTransport::new();
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    let progress: ProgressCallback = Arc::new(|update: &KeyTransferUpdate| {
        if update.chunks_sent == 1 {
            panic!("host handler bug");
        }
    });
    bridge.key_transfer().start(request(400), Some(progress)).unwrap();
    let events = until_terminal(&mut rx).await;

    assert_eq!(transport.count(Step::SendKeyChunk), 1);
    let terminals: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].outcome(), Some(Outcome::Failed));
    let error = terminals[0].error().unwrap();
    assert_eq!(error.code, 1050);
    assert_eq!(error.message, "key transfer interrupted: progress callback panicked");
    assert!(!bridge.key_transfer().is_transferring());
    assert_eq!(transport.count(Step::Disconnect), 1);
    assert_quiet(&mut rx).await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_chunk_ack_times_out() {
    let transport = MockTransport::new();
    transport.hang(Step::SendKeyChunk);
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    let started = tokio::time::Instant::now();
    bridge.key_transfer().start(request(400), None).unwrap();
    let events = until_terminal(&mut rx).await;

    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(transport.count(Step::SendKeyChunk), 1);
    let terminal = events.last().unwrap();
    assert_eq!(terminal.outcome(), Some(Outcome::TimedOut));
    let error = terminal.error().unwrap();
    assert_eq!(error.code, 1050);
    assert_eq!(error.message, "key transfer timed out after 10s");
    assert_eq!(transport.count(Step::Abort), 1);
    assert!(!bridge.key_transfer().is_transferring());
}

#[tokio::test]
async fn test_superseding_start_restarts_transfer() {
    let transport = MockTransport::new();
    transport.hang(Step::SendKeyChunk);
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    let first = bridge.key_transfer().start(request(400), None).unwrap();
    while transport.count(Step::SendKeyChunk) == 0 {
        tokio::task::yield_now().await;
    }
    transport.release(Step::SendKeyChunk);
    let second = bridge
        .key_transfer()
        .start_superseding(request(180), None)
        .await
        .unwrap();
    assert_ne!(first, second);

    let replaced = until_terminal(&mut rx).await;
    assert_eq!(replaced.last().unwrap().outcome(), Some(Outcome::Cancelled));
    let events = until_terminal(&mut rx).await;
    assert_eq!(events.last().unwrap().outcome(), Some(Outcome::Succeeded));

    let chunks = transport.chunks();
    assert_eq!(chunks[0].total_len, 400);
    assert_eq!(chunks.last().unwrap().total_len, 180);
    assert!(chunks.last().unwrap().is_last);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_restart_begins_at_first_chunk() {
    let transport = MockTransport::new();
    let bridge = paired_bridge(&transport);
    let mut rx = bridge.subscribe();

    bridge.key_transfer().start(request(360), None).unwrap();
    until_terminal(&mut rx).await;
    bridge.key_transfer().start(request(360), None).unwrap();
    until_terminal(&mut rx).await;

    let chunks = transport.chunks();
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[0].data, chunks[2].data);
}
