//! HTTP handlers outside the WebSocket protocol.

use axum::response::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Liveness probe so deployments can check the service without speaking the
/// WebSocket protocol.
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "glimpse backend is running",
    })
}
