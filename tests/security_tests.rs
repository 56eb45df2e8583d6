//! Security-focused integration tests.
//!
//! Tests token verification, request limits, CORS, and path parameter
//! handling at the API level. Runs against the in-memory store.

mod common;

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use carbonledger::api::{build_router, AppState, BODY_LIMIT_BYTES};
use carbonledger::emissions::FactorTable;
use carbonledger::store::MemoryStore;

async fn status_with_token(token: &str) -> StatusCode {
    common::build_memory_app()
        .oneshot(
            Request::builder()
                .uri("/api/emissions/get-emissions")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

// ---------------------------------------------------------------------------
// Token verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn token_signed_with_other_secret_rejected() {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let token = encode(
        &Header::default(),
        &json!({"id": 1, "exp": exp}),
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();
    assert_eq!(status_with_token(&token).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_rejected() {
    let token = encode(
        &Header::default(),
        &json!({"id": 1, "exp": 1_000}),
        &EncodingKey::from_secret(common::TEST_SECRET.as_bytes()),
    )
    .unwrap();
    assert_eq!(status_with_token(&token).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_without_numeric_id_rejected() {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let token = encode(
        &Header::default(),
        &json!({"id": "1; DROP TABLE carbon_sinks", "exp": exp}),
        &EncodingKey::from_secret(common::TEST_SECRET.as_bytes()),
    )
    .unwrap();
    assert_eq!(status_with_token(&token).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_accepted() {
    let token = common::token_for(1);
    assert_eq!(status_with_token(&token).await, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Body size limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn body_size_limit_enforced() {
    let token = common::token_for(1);
    let response = common::build_memory_app()
        .oneshot(
            Request::builder()
                .uri("/api/emissions/add-emissions")
                .method(Method::POST)
                .header("authorization", format!("Bearer {token}"))
                .header("content-type", "application/json")
                .header("content-length", (BODY_LIMIT_BYTES + 1).to_string())
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

fn app_with_origin(origin: &'static str) -> axum::Router {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(FactorTable::standard()),
        common::TEST_SECRET,
    );
    build_router(state, Some(HeaderValue::from_static(origin)))
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let response = app_with_origin("http://localhost:5173")
        .oneshot(
            Request::builder()
                .uri("/api/emissions/get-emissions")
                .method(Method::OPTIONS)
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "PUT")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert!(headers.get("access-control-allow-methods").is_some());
}

#[tokio::test]
async fn cors_does_not_echo_foreign_origin() {
    let response = app_with_origin("http://localhost:5173")
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "https://evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(
        response.headers().get("access-control-allow-origin"),
        Some(&HeaderValue::from_static("https://evil.example.com"))
    );
}

// ---------------------------------------------------------------------------
// Path parameters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_numeric_record_id_rejected() {
    let token = common::token_for(1);
    let response = common::build_memory_app()
        .oneshot(
            Request::builder()
                .uri("/api/emissions/delete-emissions/1%20OR%201=1")
                .method(Method::DELETE)
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
