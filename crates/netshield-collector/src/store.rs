//! Metric store — raw history plus one latest-status row per device.
//!
//! Two backends: [`crate::db::PgStore`] for production and [`MemoryStore`]
//! for demo mode and tests.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

use netshield_common::models::DeviceStatusRow;
use netshield_common::protocol::MetricEvent;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Append to history and upsert the device's status row. The last
    /// arrival wins regardless of the embedded timestamp.
    async fn ingest(&self, metric: &MetricEvent) -> Result<(), StoreError>;

    /// Every status row; empty when no device has reported.
    async fn list_device_status(&self) -> Result<Vec<DeviceStatusRow>, StoreError>;

    /// Drop history rows stamped before `now - horizon`. Status rows are
    /// left alone. Returns the number of rows removed.
    async fn delete_older_than(&self, horizon: Duration) -> Result<u64, StoreError>;
}

/// Unix timestamp `horizon` before now.
pub fn cutoff_unix(horizon: Duration) -> i64 {
    let horizon = i64::try_from(horizon.as_secs()).unwrap_or(i64::MAX);
    Utc::now().timestamp().saturating_sub(horizon)
}

// ── In-memory backend ───────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    metrics: Vec<MetricEvent>,
    status: BTreeMap<String, DeviceStatusRow>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the raw history, oldest arrival first.
    pub async fn metrics(&self) -> Vec<MetricEvent> {
        self.tables.lock().await.metrics.clone()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn ingest(&self, metric: &MetricEvent) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.metrics.push(metric.clone());
        tables
            .status
            .insert(metric.device_id.clone(), DeviceStatusRow::from(metric));
        Ok(())
    }

    async fn list_device_status(&self) -> Result<Vec<DeviceStatusRow>, StoreError> {
        Ok(self.tables.lock().await.status.values().cloned().collect())
    }

    async fn delete_older_than(&self, horizon: Duration) -> Result<u64, StoreError> {
        let cutoff = cutoff_unix(horizon);
        let mut tables = self.tables.lock().await;
        let before = tables.metrics.len();
        tables.metrics.retain(|m| m.timestamp_unix >= cutoff);
        Ok((before - tables.metrics.len()) as u64)
    }
}
