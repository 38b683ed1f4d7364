//! NetShield Collector
//!
//! Single binary that runs:
//! - WebSocket endpoint for agent telemetry streams
//! - REST API for device status and control pushes
//! - Retention job expiring raw metric history

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use netshield_collector::retention::{self, RetentionPolicy};
use netshield_collector::store::{MemoryStore, MetricStore};
use netshield_collector::{db, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Store ───────────────────────────────────────────────────
    let store: Arc<dyn MetricStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = db::connect(&database_url).await?;
            db::migrate(&pool).await?;
            Arc::new(db::PgStore::new(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set — running in demo mode with an in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // ── Retention ───────────────────────────────────────────────
    let policy = RetentionPolicy::from_days_and_hours(
        env_u64("RETENTION_DAYS", 30)?,
        env_u64("RETENTION_PERIOD_HOURS", 6)?,
    );
    tokio::spawn(retention::run(store.clone(), policy));

    // ── Router ──────────────────────────────────────────────────
    let app = netshield_collector::app(state::AppState::new(store));

    // ── Listen ──────────────────────────────────────────────────
    let addr: SocketAddr = std::env::var("LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8082".into())
        .parse()?;

    tracing::info!("netshield-collector listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received SIGINT, shutting down");
        })
        .await?;

    Ok(())
}

fn env_u64(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw}: {e}")),
        Err(_) => Ok(default),
    }
}
