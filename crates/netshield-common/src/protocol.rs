//! WebSocket protocol messages between the agent and the collector.
//!
//! All messages are JSON-encoded and follow a common envelope format.
//! The agent opens with `agent.hello`, then sends one `metric.report` per
//! monitor cycle. The collector may push `control.message` frames at any
//! time after the hello.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope type of the first frame an agent sends.
pub const AGENT_HELLO: &str = "agent.hello";
/// Envelope type of a per-cycle metric record.
pub const METRIC_REPORT: &str = "metric.report";
/// Envelope type of a collector-to-agent advisory.
pub const CONTROL_MESSAGE: &str = "control.message";

// ── Envelope ────────────────────────────────────────────────────────

/// The outer envelope for all WebSocket messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message ID (UUIDv7, time-ordered).
    pub id: String,
    /// Message type (dotted namespace, e.g. "metric.report").
    #[serde(rename = "type")]
    pub msg_type: String,
    /// ISO 8601 timestamp.
    pub ts: DateTime<Utc>,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Create a new envelope with a fresh UUIDv7 and current timestamp.
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            id: Uuid::now_v7().to_string(),
            msg_type: msg_type.into(),
            ts: Utc::now(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Parse the payload into a concrete type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.payload.clone())
    }

    /// Build an envelope and encode it straight to a JSON text frame.
    pub fn encode(msg_type: impl Into<String>, payload: impl Serialize) -> serde_json::Result<String> {
        serde_json::to_string(&Self::new(msg_type, payload)?)
    }
}

// ── Agent → Collector ───────────────────────────────────────────────

/// First frame on every agent stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHello {
    pub device_id: String,
    pub agent_version: String,
    pub hostname: String,
    pub arch: String,
}

/// One health assessment, emitted once per monitor cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub device_id: String,
    pub user_id: String,
    pub domain: String,
    pub timestamp_unix: i64,
    pub ssid: String,
    pub interface_name: String,
    pub signal_percent: u8,
    /// Absent when the latency probe failed for this cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<u32>,
    pub experience_score: u8,
}

// ── Collector → Agent ───────────────────────────────────────────────

/// Asynchronous advisory pushed by the collector.
///
/// `kind` is an open tag so new commands need no protocol change; `data` is
/// opaque to the transport and travels as base64 inside the JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ControlMessage {
    pub fn new(kind: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
        }
    }
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
