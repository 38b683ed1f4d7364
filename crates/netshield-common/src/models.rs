//! Data models for the NetShield platform.
//!
//! These types are written by the collector and served to dashboards; the
//! agent only ever produces the [`MetricEvent`]s they are derived from.

use serde::{Deserialize, Serialize};

use crate::protocol::MetricEvent;

// ── Device status ───────────────────────────────────────────────────

/// Latest known health of one device, upserted on every ingested metric.
///
/// Carries the same fields as [`MetricEvent`]; there is exactly one row per
/// distinct `device_id` and no history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatusRow {
    pub device_id: String,
    pub user_id: String,
    pub domain: String,
    pub timestamp_unix: i64,
    pub ssid: String,
    pub interface_name: String,
    pub signal_percent: u8,
    pub avg_latency_ms: Option<u32>,
    pub experience_score: u8,
}

impl From<&MetricEvent> for DeviceStatusRow {
    fn from(m: &MetricEvent) -> Self {
        Self {
            device_id: m.device_id.clone(),
            user_id: m.user_id.clone(),
            domain: m.domain.clone(),
            timestamp_unix: m.timestamp_unix,
            ssid: m.ssid.clone(),
            interface_name: m.interface_name.clone(),
            signal_percent: m.signal_percent,
            avg_latency_ms: m.avg_latency_ms,
            experience_score: m.experience_score,
        }
    }
}
