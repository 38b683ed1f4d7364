//! WebSocket handler for agent telemetry streams.
//!
//! Endpoint: GET /agent/ws
//!
//! Flow:
//! 1. Agent connects, sends `agent.hello`
//! 2. Collector registers the agent under its device_id
//! 3. Agent sends one `metric.report` per monitor cycle; each is ingested
//! 4. Collector may push `control.message` frames queued by the REST API
//! 5. On disconnect the registration is removed

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::stream::StreamExt;
use tokio::sync::mpsc;

use netshield_common::protocol::{AGENT_HELLO, AgentHello, Envelope, METRIC_REPORT, MetricEvent};

use crate::state::{AgentHandle, AppState};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Axum handler — upgrades HTTP to WebSocket.
pub async fn handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Main WebSocket handler for a single agent connection.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Wait for the first message — must be agent.hello
    let hello = match ws_rx.next().await {
        Some(Ok(Message::Text(text))) => match parse_hello(&text) {
            Ok(hello) => hello,
            Err(reason) => {
                tracing::warn!(%reason, "rejecting agent stream");
                let _ = ws_tx.send(Message::Close(None)).await;
                return;
            }
        },
        _ => return,
    };
    let device_id = hello.device_id.clone();
    let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);

    tracing::info!(
        device_id = %device_id,
        hostname = %hello.hostname,
        agent_version = %hello.agent_version,
        arch = %hello.arch,
        "agent connected"
    );

    // Create a channel for sending messages to this agent
    let (tx, mut rx) = mpsc::channel::<String>(64);

    // Register agent in shared state; a reconnect replaces the stale handle
    state.agents().insert(
        device_id.clone(),
        AgentHandle {
            tx,
            connection_id,
        },
    );

    // Bidirectional message loop
    loop {
        tokio::select! {
            // Messages FROM agent
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_agent_message(&state, &device_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(device_id = %device_id, error = %e, "agent stream error");
                        break;
                    }
                    _ => {} // Ping/Pong handled by axum
                }
            }

            // Messages TO agent (from the control push endpoint)
            msg = rx.recv() => {
                match msg {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    // Cleanup, unless a newer connection already took over this device
    state
        .agents()
        .remove_if(&device_id, |_, handle| handle.connection_id == connection_id);

    tracing::info!(device_id = %device_id, "agent disconnected");
}

fn parse_hello(raw: &str) -> Result<AgentHello, String> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| format!("invalid message: {e}"))?;
    if envelope.msg_type != AGENT_HELLO {
        return Err(format!(
            "first message must be {AGENT_HELLO}, got {}",
            envelope.msg_type
        ));
    }
    let hello: AgentHello = envelope
        .parse_payload()
        .map_err(|e| format!("invalid {AGENT_HELLO} payload: {e}"))?;
    if hello.device_id.trim().is_empty() {
        return Err("empty device_id".into());
    }
    Ok(hello)
}

/// Handle an incoming message from a registered agent.
async fn handle_agent_message(state: &AppState, device_id: &str, raw: &str) {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(device_id = %device_id, "invalid message from agent: {e}");
            return;
        }
    };

    match envelope.msg_type.as_str() {
        METRIC_REPORT => {
            let metric = match envelope.parse_payload::<MetricEvent>() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(device_id = %device_id, "invalid metric payload: {e}");
                    return;
                }
            };
            if metric.device_id != device_id {
                tracing::debug!(
                    hello_device = %device_id,
                    metric_device = %metric.device_id,
                    "metric device differs from hello"
                );
            }
            if let Err(e) = state.store().ingest(&metric).await {
                tracing::error!(device_id = %metric.device_id, error = %e, "failed to ingest metric");
            }
        }
        other => {
            tracing::debug!(device_id = %device_id, msg_type = %other, "unhandled agent message type");
        }
    }
}
