//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use carbonledger::api::{build_router, AppState};
use carbonledger::db::Database;
use carbonledger::emissions::FactorTable;
use carbonledger::store::{MemoryStore, RecordStore};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

pub const TEST_SECRET: &str = "test-secret";

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// Connect to the test database, apply the schema, and empty both tables.
pub async fn setup_test_db() -> Database {
    let db = Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to apply schema");
    sqlx::raw_sql("TRUNCATE TABLE activity_records, carbon_sinks RESTART IDENTITY")
        .execute(db.pool())
        .await
        .unwrap();
    db
}

/// Router over the given store with the standard factor table.
pub fn build_app_with(store: Arc<dyn RecordStore>) -> axum::Router {
    let state = AppState::new(store, Arc::new(FactorTable::standard()), TEST_SECRET);
    build_router(state, None)
}

/// Router over a fresh in-memory store.
pub fn build_memory_app() -> axum::Router {
    build_app_with(Arc::new(MemoryStore::new()))
}

/// A bearer token for `user_id`, valid for an hour.
pub fn token_for(user_id: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::default(),
        &json!({"id": user_id, "exp": exp}),
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn excavation_body() -> serde_json::Value {
    json!({
        "excavation": {
            "coalAmount": 10,
            "method": "Surface Mining",
            "fuelType": "diesel",
            "distance": 5,
            "equipmentUsed": "Excavator"
        }
    })
}

pub fn afforestation_body(area: f64) -> serde_json::Value {
    json!({
        "type": "Afforestation",
        "location": "Jharia",
        "afforestation": {"area": area, "treePlantingRate": 4, "treeType": "Sal"}
    })
}
