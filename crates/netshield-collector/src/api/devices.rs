//! Device endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;

use netshield_common::models::DeviceStatusRow;
use netshield_common::protocol::{CONTROL_MESSAGE, ControlMessage, Envelope};

use super::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{device_id}/control", post(push_control))
}

// ── GET /api/status ─────────────────────────────────────────────────

pub async fn list_status(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceStatusRow>>, ApiError> {
    let rows = state
        .store()
        .list_device_status()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(rows))
}

// ── POST /api/devices/{device_id}/control ───────────────────────────

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    #[serde(rename = "type")]
    pub kind: String,
    /// UTF-8 text carried as the message data.
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct ControlQueued {
    pub device_id: String,
    pub message_id: String,
}

async fn push_control(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(body): Json<ControlRequest>,
) -> Result<(StatusCode, Json<ControlQueued>), ApiError> {
    if body.kind.trim().is_empty() {
        return Err(ApiError::bad_request("type must not be empty"));
    }

    let tx = state
        .agents()
        .get(&device_id)
        .map(|agent| agent.tx.clone())
        .ok_or_else(|| ApiError::not_found("agent not connected"))?;

    let envelope = Envelope::new(CONTROL_MESSAGE, ControlMessage::new(body.kind, body.data))
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let message_id = envelope.id.clone();
    let json = serde_json::to_string(&envelope).map_err(|e| ApiError::internal(e.to_string()))?;

    tx.try_send(json).map_err(|e| match e {
        TrySendError::Full(_) => ApiError::unavailable("agent queue full"),
        TrySendError::Closed(_) => ApiError::not_found("agent not connected"),
    })?;

    tracing::info!(device_id = %device_id, message_id = %message_id, "control message queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(ControlQueued {
            device_id,
            message_id,
        }),
    ))
}
