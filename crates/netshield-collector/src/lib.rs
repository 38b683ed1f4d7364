//! NetShield collector library.
//!
//! Re-exports the router, shared state, store backends and the retention
//! job so they can be used by integration tests.

pub mod api;
pub mod db;
pub mod retention;
pub mod state;
pub mod store;
pub mod ws_agent;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full HTTP surface: REST API, agent stream and liveness.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::router())
        .route("/status", get(api::devices::list_status))
        .route("/agent/ws", get(ws_agent::handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
