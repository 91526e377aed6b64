//! GET /health: liveness plus table and gate status.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub records: usize,
    pub loaded_at: DateTime<Utc>,
    pub in_flight_extractions: usize,
    pub max_concurrent_extractions: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let table = state.orchestrator.table();
    let gate = state.orchestrator.gate();

    Json(HealthResponse {
        status: "ok",
        records: table.len(),
        loaded_at: table.loaded_at(),
        in_flight_extractions: gate.in_flight(),
        max_concurrent_extractions: gate.capacity(),
    })
}
