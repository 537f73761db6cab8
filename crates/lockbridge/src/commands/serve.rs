//! JSON-lines bridge on stdio.
//!
//! Each stdin line is a request `{"id", "method", "args"}`. Replies are
//! `{"id", "result"}` or `{"id", "error"}`; session events are
//! `{"event": {...}}`. One writer task owns stdout so lines never
//! interleave. On EOF live sessions are cancelled and their terminal
//! events flushed before exit.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lockbridge_config::Config;
use lockbridge_core::{
    Bridge, ErrorKind, ErrorRecord, EventReceiver, LockTransport, StateMonitor,
};

use crate::cli::ServeArgs;
use crate::error::CliError;
use crate::sim::SimulatedTransport;

/// Upper bound on waiting for cancelled sessions at shutdown.
const DRAIN_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    args: Value,
}

pub async fn handle(args: ServeArgs, cfg: &Config) -> Result<(), CliError> {
    let mut simulator = cfg.simulator.clone();
    if let Some(latency_ms) = args.latency_ms {
        simulator.latency_ms = latency_ms;
    }
    let radio_state = args.radio_state.unwrap_or(simulator.radio_state);

    let transport: Arc<dyn LockTransport> = Arc::new(SimulatedTransport::new(&simulator));
    let bridge = Bridge::with_radio(
        transport,
        cfg.to_bridge_config()?,
        Arc::new(StateMonitor::new(radio_state)),
    );

    let (out_tx, out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(write_lines(out_rx));
    let forwarder = tokio::spawn(forward_events(bridge.subscribe(), out_tx.clone()));
    let radio = bridge.forward_radio_events();

    info!(radio = %radio_state, latency_ms = simulator.latency_ms, "serving on stdio");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = dispatch(&bridge, line).await;
        if out_tx.send(reply).is_err() {
            warn!("stdout closed, stopping");
            break;
        }
    }

    debug!("input closed, shutting down");
    bridge.shutdown();
    drain(&bridge).await;
    bridge.unsubscribe();
    drop(out_tx);

    // Both tasks end on their own once the bridge is shut down.
    let _ = radio.await;
    let _ = forwarder.await;
    match writer.await {
        Ok(result) => result.map_err(CliError::from),
        Err(join) => Err(CliError::Io(std::io::Error::other(join))),
    }
}

/// Answer one request line.
async fn dispatch(bridge: &Bridge, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed request");
            let record = ErrorRecord {
                code: ErrorKind::InvalidParameters.code(),
                message: format!("malformed request: {e}"),
                details: None,
            };
            return json!({ "id": Value::Null, "error": record });
        }
    };

    debug!(id = %request.id, method = %request.method, "request");
    match bridge.handle_method(&request.method, request.args).await {
        Ok(result) => json!({ "id": request.id, "result": result }),
        Err(record) => json!({ "id": request.id, "error": record }),
    }
}

async fn forward_events(mut events: EventReceiver, out: mpsc::UnboundedSender<Value>) {
    while let Some(event) = events.recv().await {
        if out.send(json!({ "event": event })).is_err() {
            break;
        }
    }
}

async fn write_lines(mut rx: mpsc::UnboundedReceiver<Value>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(value) = rx.recv().await {
        let mut line = serde_json::to_vec(&value)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Wait until every orchestrator has emitted its terminal event.
async fn drain(bridge: &Bridge) {
    let idle = async {
        while bridge.is_busy() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    if tokio::time::timeout(DRAIN_LIMIT, idle).await.is_err() {
        warn!("sessions still live at exit");
    }
}
