//! Carbon sink API.
//!
//! Batch submission accepts either a bare JSON array or
//! `{"carbonSinks": [...]}`. Every entry is validated before anything is
//! written, and the store inserts the batch atomically.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::middleware_auth::RequireAuth;
use super::{internal_error, invalid_json, invalid_record, not_found, validation_error, AppState};
use crate::emissions::SinkDraft;
use crate::store::SinkUpdateOutcome;

const NOT_FOUND: &str = "Carbon sink not found or unauthorized";

#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum SinkBatch {
    List(Vec<SinkDraft>),
    Wrapped {
        #[serde(rename = "carbonSinks")]
        carbon_sinks: Vec<SinkDraft>,
    },
}

impl SinkBatch {
    fn into_drafts(self) -> Vec<SinkDraft> {
        match self {
            SinkBatch::List(drafts) => drafts,
            SinkBatch::Wrapped { carbon_sinks } => carbon_sinks,
        }
    }
}

pub(super) async fn handler_api_add_carbon_sink(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    payload: Result<Json<SinkDraft>, JsonRejection>,
) -> impl IntoResponse {
    let Json(draft) = match payload {
        Ok(p) => p,
        Err(rejection) => return invalid_json(rejection),
    };
    if let Err(e) = draft.validate() {
        return invalid_record("Error adding carbon sink", &e);
    }

    match state.store.insert_sinks(user.user_id, vec![draft]).await {
        Ok(mut inserted) => {
            state.prom_metrics.record_write("carbon_sinks", 1);
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Carbon sink added successfully",
                    "carbonSink": inserted.pop(),
                })),
            )
                .into_response()
        }
        Err(e) => internal_error("Error adding carbon sink", e),
    }
}

pub(super) async fn handler_api_add_carbon_sinks(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    payload: Result<Json<SinkBatch>, JsonRejection>,
) -> impl IntoResponse {
    let Json(batch) = match payload {
        Ok(p) => p,
        Err(rejection) => return invalid_json(rejection),
    };
    let drafts = batch.into_drafts();
    if drafts.is_empty() {
        return validation_error(
            "Error adding carbon sinks",
            "No carbon sinks provided".to_string(),
        );
    }
    for (i, draft) in drafts.iter().enumerate() {
        if let Err(e) = draft.validate() {
            return validation_error("Error adding carbon sinks", format!("carbonSinks[{i}]: {e}"));
        }
    }

    let count = drafts.len() as u64;
    match state.store.insert_sinks(user.user_id, drafts).await {
        Ok(inserted) => {
            state.prom_metrics.record_write("carbon_sinks", count);
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Carbon sinks added successfully",
                    "carbonSinks": inserted,
                })),
            )
                .into_response()
        }
        Err(e) => internal_error("Error adding carbon sinks", e),
    }
}

pub(super) async fn handler_api_update_carbon_sink(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    AxumPath(id): AxumPath<i64>,
    payload: Result<Json<SinkDraft>, JsonRejection>,
) -> impl IntoResponse {
    let Json(update) = match payload {
        Ok(p) => p,
        Err(rejection) => return invalid_json(rejection),
    };

    match state.store.update_sink(user.user_id, id, update).await {
        Ok(SinkUpdateOutcome::Updated(sink)) => {
            state.prom_metrics.record_write("carbon_sinks", 1);
            Json(json!({
                "message": "Carbon sink updated successfully",
                "carbonSink": sink,
            }))
            .into_response()
        }
        Ok(SinkUpdateOutcome::NotFound) => not_found(NOT_FOUND),
        Ok(SinkUpdateOutcome::Invalid(e)) => invalid_record("Error updating carbon sink", &e),
        Err(e) => internal_error("Error updating carbon sink", e),
    }
}

pub(super) async fn handler_api_get_carbon_sinks(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    match state.store.fetch_sink_records(user.user_id).await {
        Ok(sinks) => Json(sinks).into_response(),
        Err(e) => internal_error("Error retrieving carbon sinks", e),
    }
}

pub(super) async fn handler_api_delete_carbon_sink(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    AxumPath(id): AxumPath<i64>,
) -> impl IntoResponse {
    match state.store.delete_sink(user.user_id, id).await {
        Ok(true) => Json(json!({"message": "Carbon sink deleted successfully"})).into_response(),
        Ok(false) => not_found(NOT_FOUND),
        Err(e) => internal_error("Error deleting carbon sink", e),
    }
}
