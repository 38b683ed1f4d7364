//! Database connection pool, migrations and the Postgres-backed store.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use netshield_common::models::DeviceStatusRow;
use netshield_common::protocol::MetricEvent;

use crate::store::{MetricStore, StoreError, cutoff_unix};

/// Connect to PostgreSQL and return a connection pool.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;

    tracing::info!("connected to PostgreSQL");
    Ok(pool)
}

/// Run embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("database migrations complete");
    Ok(())
}

/// [`MetricStore`] over the `metrics` and `device_status` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetricStore for PgStore {
    async fn ingest(&self, m: &MetricEvent) -> Result<(), StoreError> {
        let latency = m.avg_latency_ms.map(|v| i32::try_from(v).unwrap_or(i32::MAX));
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO metrics (device_id, user_id, domain, timestamp_unix, ssid, interface_name, signal_percent, avg_latency_ms, experience_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&m.device_id)
        .bind(&m.user_id)
        .bind(&m.domain)
        .bind(m.timestamp_unix)
        .bind(&m.ssid)
        .bind(&m.interface_name)
        .bind(i16::from(m.signal_percent))
        .bind(latency)
        .bind(i16::from(m.experience_score))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO device_status (device_id, user_id, domain, timestamp_unix, ssid, interface_name, signal_percent, avg_latency_ms, experience_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (device_id) DO UPDATE SET \
                user_id = EXCLUDED.user_id, \
                domain = EXCLUDED.domain, \
                timestamp_unix = EXCLUDED.timestamp_unix, \
                ssid = EXCLUDED.ssid, \
                interface_name = EXCLUDED.interface_name, \
                signal_percent = EXCLUDED.signal_percent, \
                avg_latency_ms = EXCLUDED.avg_latency_ms, \
                experience_score = EXCLUDED.experience_score",
        )
        .bind(&m.device_id)
        .bind(&m.user_id)
        .bind(&m.domain)
        .bind(m.timestamp_unix)
        .bind(&m.ssid)
        .bind(&m.interface_name)
        .bind(i16::from(m.signal_percent))
        .bind(latency)
        .bind(i16::from(m.experience_score))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_device_status(&self) -> Result<Vec<DeviceStatusRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT device_id, user_id, domain, timestamp_unix, ssid, interface_name, signal_percent, avg_latency_ms, experience_score \
             FROM device_status ORDER BY device_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(status_from_row).collect()
    }

    async fn delete_older_than(&self, horizon: Duration) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM metrics WHERE timestamp_unix < $1")
            .bind(cutoff_unix(horizon))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn status_from_row(row: &PgRow) -> Result<DeviceStatusRow, StoreError> {
    let latency: Option<i32> = row.try_get("avg_latency_ms")?;
    Ok(DeviceStatusRow {
        device_id: row.try_get("device_id")?,
        user_id: row.try_get("user_id")?,
        domain: row.try_get("domain")?,
        timestamp_unix: row.try_get("timestamp_unix")?,
        ssid: row.try_get("ssid")?,
        interface_name: row.try_get("interface_name")?,
        signal_percent: percent(row, "signal_percent")?,
        avg_latency_ms: latency
            .map(|v| {
                u32::try_from(v).map_err(|_| StoreError::OutOfRange {
                    field: "avg_latency_ms",
                    value: i64::from(v),
                })
            })
            .transpose()?,
        experience_score: percent(row, "experience_score")?,
    })
}

fn percent(row: &PgRow, field: &'static str) -> Result<u8, StoreError> {
    let value: i16 = row.try_get(field)?;
    u8::try_from(value).map_err(|_| StoreError::OutOfRange {
        field,
        value: i64::from(value),
    })
}
