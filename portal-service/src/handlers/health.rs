use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::{get_metrics, Resource};
use crate::AppState;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "portal-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: the upstream API must answer.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let probe = tokio::time::timeout(
        state.config.dashboard.fetch_timeout(),
        state.backend.fetch(Resource::SystemSettings, &[]),
    )
    .await;

    match probe {
        Ok(Ok(_)) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": e.to_string() })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": "upstream timed out" })),
        ),
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
