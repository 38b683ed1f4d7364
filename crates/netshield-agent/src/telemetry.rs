//! Telemetry channel — the duplex WebSocket stream to the collector.
//!
//! Handles:
//! - One connection attempt at startup (callers fall back to standalone
//!   mode when it fails)
//! - `agent.hello` as the first frame
//! - Outgoing `metric.report`, one per monitor cycle, sent synchronously
//! - A background listener that logs incoming `control.message` frames
//!   until the stream closes; it does not reconnect

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use netshield_common::protocol::{
    AGENT_HELLO, AgentHello, CONTROL_MESSAGE, ControlMessage, Envelope, METRIC_REPORT, MetricEvent,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("collector unreachable at {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("connecting to {url} timed out after {timeout_secs}s")]
    ConnectTimeout { url: String, timeout_secs: u64 },
    #[error("send failed: {0}")]
    Send(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unexpected frame type: {0}")]
    UnexpectedType(String),
}

/// Destination for per-cycle metric events.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn report(&self, metric: &MetricEvent) -> Result<(), TelemetryError>;
}

/// An open stream to the collector.
pub struct TelemetryChannel {
    sink: Mutex<SplitSink<WsStream, Message>>,
    listener: JoinHandle<()>,
}

impl TelemetryChannel {
    /// Dial the collector, announce this agent, and start the control
    /// listener.
    pub async fn connect(
        url: &str,
        hello: &AgentHello,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let (ws, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| TelemetryError::ConnectTimeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| TelemetryError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let (mut ws_tx, ws_rx) = ws.split();

        let json = Envelope::encode(AGENT_HELLO, hello)?;
        ws_tx.send(Message::Text(json.into())).await?;

        tracing::info!(url = %url, device_id = %hello.device_id, "telemetry stream open");

        Ok(Self {
            sink: Mutex::new(ws_tx),
            listener: tokio::spawn(listen(ws_rx)),
        })
    }

    /// Whether the control listener is still reading.
    pub fn is_listening(&self) -> bool {
        !self.listener.is_finished()
    }
}

impl Drop for TelemetryChannel {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[async_trait]
impl MetricSink for TelemetryChannel {
    async fn report(&self, metric: &MetricEvent) -> Result<(), TelemetryError> {
        let json = Envelope::encode(METRIC_REPORT, metric)?;
        self.sink.lock().await.send(Message::Text(json.into())).await?;
        Ok(())
    }
}

/// Read control frames until the collector closes the stream or it errors.
async fn listen(mut ws_rx: SplitStream<WsStream>) {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match decode_control(&text) {
                Ok(control) => handle_control(&control),
                Err(e) => tracing::warn!(error = %e, "ignoring frame from collector"),
            },
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "collector closed telemetry stream");
                return;
            }
            Ok(_) => {} // Ping/Pong handled by tungstenite
            Err(e) => {
                tracing::warn!(error = %e, "telemetry stream read error, listener stopped");
                return;
            }
        }
    }
    tracing::info!("telemetry stream ended, listener stopped");
}

/// Decode one text frame into a control message.
pub fn decode_control(raw: &str) -> Result<ControlMessage, TelemetryError> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    if envelope.msg_type != CONTROL_MESSAGE {
        return Err(TelemetryError::UnexpectedType(envelope.msg_type));
    }
    Ok(envelope.parse_payload()?)
}

/// Control messages are advisory for now.
fn handle_control(msg: &ControlMessage) {
    tracing::info!(
        kind = %msg.kind,
        data = %String::from_utf8_lossy(&msg.data),
        "control message from collector"
    );
}
