//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// When the current snapshot was computed.
    snapshot_at: DateTime<Utc>,
}

/// Public health check endpoint for load balancer probes.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        snapshot_at: state.snapshot.read().generated_at,
    })
}
