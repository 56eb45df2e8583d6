//! Activity record API and emission calculations.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use super::middleware_auth::RequireAuth;
use super::{internal_error, invalid_json, invalid_record, not_found, AppState};
use crate::emissions::{compute_aggregate, compute_history, ActivityDraft};

const NOT_FOUND: &str = "Emission data not found or unauthorized";

pub(super) async fn handler_api_add_emission(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    payload: Result<Json<ActivityDraft>, JsonRejection>,
) -> impl IntoResponse {
    let Json(draft) = match payload {
        Ok(p) => p,
        Err(rejection) => return invalid_json(rejection),
    };
    if let Err(e) = draft.validate() {
        return invalid_record("Error adding emission data", &e);
    }

    match state.store.insert_activity(user.user_id, draft).await {
        Ok(record) => {
            state.prom_metrics.record_write("activity_records", 1);
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Emission data added successfully",
                    "emission": record,
                })),
            )
                .into_response()
        }
        Err(e) => internal_error("Error adding emission data", e),
    }
}

pub(super) async fn handler_api_update_emission(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    AxumPath(id): AxumPath<i64>,
    payload: Result<Json<ActivityDraft>, JsonRejection>,
) -> impl IntoResponse {
    let Json(draft) = match payload {
        Ok(p) => p,
        Err(rejection) => return invalid_json(rejection),
    };
    if let Err(e) = draft.validate() {
        return invalid_record("Error updating emission data", &e);
    }

    match state.store.update_activity(user.user_id, id, draft).await {
        Ok(Some(record)) => {
            state.prom_metrics.record_write("activity_records", 1);
            Json(json!({
                "message": "Emission data updated successfully",
                "emission": record,
            }))
            .into_response()
        }
        Ok(None) => not_found(NOT_FOUND),
        Err(e) => internal_error("Error updating emission data", e),
    }
}

pub(super) async fn handler_api_get_emissions(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    match state.store.fetch_activity_records(user.user_id).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => internal_error("Error retrieving emission data", e),
    }
}

pub(super) async fn handler_api_delete_emission(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
    AxumPath(id): AxumPath<i64>,
) -> impl IntoResponse {
    match state.store.delete_activity(user.user_id, id).await {
        Ok(true) => Json(json!({"message": "Emission data deleted successfully"})).into_response(),
        Ok(false) => not_found(NOT_FOUND),
        Err(e) => internal_error("Error deleting emission data", e),
    }
}

pub(super) async fn handler_api_calculate_emissions(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    match compute_aggregate(state.store.as_ref(), &state.factors, user.user_id).await {
        Ok(report) => {
            state.prom_metrics.record_calculation("aggregate");
            Json(report).into_response()
        }
        Err(e) => internal_error("Error calculating emissions", e),
    }
}

pub(super) async fn handler_api_emission_calculations(
    State(state): State<Arc<AppState>>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    match compute_history(state.store.as_ref(), &state.factors, user.user_id).await {
        Ok(entries) => {
            state.prom_metrics.record_calculation("history");
            Json(entries).into_response()
        }
        Err(e) => internal_error("Error retrieving emission calculations", e),
    }
}
