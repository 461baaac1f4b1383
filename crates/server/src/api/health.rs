use axum::Json;
use axum::extract::State;
use draftsync_lifecycle::MetricsSnapshot;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub metrics: MetricsSnapshot,
}

/// `GET /health` -- returns service status together with a metrics snapshot.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        metrics: state.metrics.snapshot(),
    })
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
