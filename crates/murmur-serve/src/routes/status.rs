//! Store status endpoint.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use murmur_core::RecordStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Store status response.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Records held by the store, inside or outside the window.
    pub total_records: u64,
    /// Records in the current snapshot.
    pub window_records: usize,
    pub snapshot_at: DateTime<Utc>,
}

/// `GET /api/v1/status`
///
/// Unlike the other endpoints this reads the store directly, so it doubles
/// as a readiness check for the database.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let store = state.store.clone();
    let total_records = tokio::task::spawn_blocking(move || store.count())
        .await
        .map_err(anyhow::Error::from)??;

    let snapshot = state.snapshot.read();
    Ok(Json(StatusResponse {
        total_records,
        window_records: snapshot.record_count,
        snapshot_at: snapshot.generated_at,
    }))
}
