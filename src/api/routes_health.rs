//! # Health & Observability Endpoints
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `GET /health` | Plain status object for simple uptime checks |
//! | `GET /healthz` | Liveness, process is alive |
//! | `GET /readyz` | Readiness, record store reachable |
//! | `GET /metrics` | Prometheus scraping endpoint |
//!
//! The readiness probe calls the store's health check with a 2-second timeout
//! and answers 503 while storage is unreachable.

use super::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

pub async fn handler_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

pub async fn handler_healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn handler_readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check =
        tokio::time::timeout(std::time::Duration::from_secs(2), state.store.health_check()).await;

    match check {
        Ok(Ok(())) => (StatusCode::OK, "ok"),
        Ok(Err(_)) => (StatusCode::SERVICE_UNAVAILABLE, "storage unreachable"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage timeout"),
    }
}

pub async fn handler_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.prom_metrics.encode();
    (
        StatusCode::OK,
        [(
            "content-type",
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    )
}
