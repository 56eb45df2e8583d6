//! # API: HTTP Server for Records and Emission Calculations
//!
//! Runs an Axum HTTP server exposing authenticated record management for
//! activity records and carbon sinks, the aggregate and history calculations,
//! and health/metrics endpoints.
//!
//! ## Routes
//!
//! | Prefix | Handlers |
//! |--------|----------|
//! | `/api/emissions` | [`routes_emissions`]: activity CRUD, calculate, history |
//! | `/api/carbon-sinks` | [`routes_sinks`]: sink CRUD, batch insert |
//! | `/health`, `/healthz`, `/readyz`, `/metrics` | [`routes_health`] |
//!
//! Every request passes through the request-id/metrics middleware, which wraps
//! the handler in a `request` tracing span and records its latency.

pub(crate) mod middleware_auth;
mod routes_emissions;
mod routes_health;
mod routes_sinks;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};

use crate::emissions::{FactorTable, ValidationError};
use crate::prom_metrics;
use crate::store::RecordStore;

/// Maximum accepted request body (50 MiB).
pub const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub factors: Arc<FactorTable>,
    pub jwt_secret: String,
    pub prom_metrics: prom_metrics::Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        factors: Arc<FactorTable>,
        jwt_secret: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(AppState {
            store,
            factors,
            jwt_secret: jwt_secret.into(),
            prom_metrics: prom_metrics::Metrics::new(),
        })
    }
}

// ── Response helpers ────────────────────────────────────────────

/// 500 with the storage error in `details`. Logged at warn.
pub(crate) fn internal_error(context: &str, e: anyhow::Error) -> Response {
    warn!(error = %e, "{}", context);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": context, "details": format!("{e:#}")})),
    )
        .into_response()
}

pub(crate) fn validation_error(context: &str, details: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": context, "details": details})),
    )
        .into_response()
}

pub(crate) fn invalid_record(context: &str, e: &ValidationError) -> Response {
    validation_error(context, e.to_string())
}

pub(crate) fn invalid_json(rejection: JsonRejection) -> Response {
    let status = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(json!({"error": "Invalid JSON", "details": rejection.body_text()})),
    )
        .into_response()
}

pub(crate) fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": message}))).into_response()
}

// ── Middleware ──────────────────────────────────────────────────

/// Records HTTP request duration into the Prometheus histogram, propagates or
/// generates an `x-request-id`, and runs the request inside a tracing span.
async fn metrics_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let norm_path = normalize_path(&raw_path);
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let mut response = next.run(req).instrument(span).await;

    state
        .prom_metrics
        .http_request_duration
        .get_or_create(&prom_metrics::HttpLabel {
            method,
            path: norm_path,
        })
        .observe(start.elapsed().as_secs_f64());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Collapse numeric ids and UUIDs into placeholders so metric labels stay
/// bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.is_empty() {
                seg.to_string()
            } else if seg.chars().all(|c| c.is_ascii_digit()) {
                ":id".to_string()
            } else if seg.len() == 36 && seg.chars().filter(|c| *c == '-').count() == 4 {
                ":uuid".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn cors_layer(origin: Option<HeaderValue>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    match origin {
        Some(origin) => base.allow_origin(origin).allow_credentials(true),
        None => base.allow_origin(Any),
    }
}

pub fn build_router(state: Arc<AppState>, cors_origin: Option<HeaderValue>) -> Router {
    let emissions = Router::new()
        .route("/add-emissions", post(routes_emissions::handler_api_add_emission))
        .route(
            "/update-emissions/{id}",
            put(routes_emissions::handler_api_update_emission),
        )
        .route("/get-emissions", get(routes_emissions::handler_api_get_emissions))
        .route(
            "/delete-emissions/{id}",
            delete(routes_emissions::handler_api_delete_emission),
        )
        .route(
            "/calculate-emissions",
            get(routes_emissions::handler_api_calculate_emissions),
        )
        .route(
            "/get-emission-calculations",
            get(routes_emissions::handler_api_emission_calculations),
        );

    let sinks = Router::new()
        .route(
            "/add-multiple-carbon-sinks",
            post(routes_sinks::handler_api_add_carbon_sinks),
        )
        .route("/add-carbon-sink", post(routes_sinks::handler_api_add_carbon_sink))
        .route(
            "/update-carbon-sink/{id}",
            put(routes_sinks::handler_api_update_carbon_sink),
        )
        .route("/get-carbon-sinks", get(routes_sinks::handler_api_get_carbon_sinks))
        .route(
            "/delete-carbon-sink/{id}",
            delete(routes_sinks::handler_api_delete_carbon_sink),
        );

    Router::new()
        .nest("/api/emissions", emissions)
        .nest("/api/carbon-sinks", sinks)
        .route("/health", get(routes_health::handler_health))
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .layer(cors_layer(cors_origin))
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .with_state(state)
}

/// Serve until SIGINT/SIGTERM.
pub async fn run(port: u16, state: Arc<AppState>, cors_origin: Option<&str>) -> Result<()> {
    let origin = cors_origin
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{o}'")))
        .transpose()?;
    let app = build_router(state, origin);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "carbonledger API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}
