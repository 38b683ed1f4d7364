//! Status facade — local HTTP view of the monitor.
//!
//! Bound to loopback by default. Provides:
//!
//! - `GET  /current`      latest health snapshot
//! - `GET  /mode`         current failover mode
//! - `POST /mode/toggle`  flip between passive failover and scan mode
//! - `GET  /health`       liveness

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::monitor::{HealthSnapshot, Monitor};

#[derive(Debug, Serialize)]
struct ModeResponse {
    switch_automatically: bool,
}

/// Routes for the facade, without binding a socket.
pub fn router(monitor: Arc<Monitor>) -> Router {
    Router::new()
        .route("/current", get(current))
        .route("/mode", get(mode))
        .route("/mode/toggle", post(toggle_mode))
        .route("/health", get(health))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(monitor)
}

/// Run the facade as a background task. A bind or serve failure is logged
/// and ends only this task.
pub fn spawn(monitor: Arc<Monitor>, addr: SocketAddr) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run(monitor, addr).await {
            tracing::error!(addr = %addr, "status facade failed: {e}");
        }
    })
}

/// Serve the facade until the listener fails.
pub async fn run(monitor: Arc<Monitor>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("status facade on http://{addr}");
    axum::serve(listener, router(monitor)).await?;
    Ok(())
}

async fn current(State(monitor): State<Arc<Monitor>>) -> Json<HealthSnapshot> {
    Json(monitor.snapshot().await)
}

async fn mode(State(monitor): State<Arc<Monitor>>) -> Json<ModeResponse> {
    Json(ModeResponse {
        switch_automatically: monitor.switch_automatically(),
    })
}

async fn toggle_mode(State(monitor): State<Arc<Monitor>>) -> Json<ModeResponse> {
    let enabled = monitor.toggle_switch_automatically();
    tracing::info!(switch_automatically = enabled, "failover mode changed");
    Json(ModeResponse {
        switch_automatically: enabled,
    })
}

async fn health() -> &'static str {
    "ok"
}
