use crate::app::AppState;
use crate::callrecord::CallRecord;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;


#[derive(Debug, Deserialize)]
pub struct CallsQuery {
    /// Restrict the listing to this user's permitted assistants; omit
    /// for the unrestricted administrator view.
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MappingPayload {
    pub user_email: String,
    pub assistant_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calls", get(list_calls))
        .route("/calls/{id}", get(get_call))
        .route(
            "/mappings",
            get(list_mappings).post(add_mapping).delete(remove_mapping),
        )
}

async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<CallsQuery>,
) -> Json<Vec<CallRecord>> {
    let calls = match query.email {
        Some(ref email) => state.service.fetch_calls_for_user(email).await,
        None => state.service.fetch_calls(None).await,
    };
    Json(calls)
}

async fn get_call(State(state): State<AppState>, Path(call_id): Path<String>) -> Response {
    match state.service.fetch_call_by_id(&call_id).await {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Call not found" })),
        )
            .into_response(),
    }
}

async fn list_mappings(State(state): State<AppState>) -> Response {
    match state.mappings.all_mappings().await {
        Ok(mappings) => Json(mappings).into_response(),
        Err(e) => {
            warn!("failed to list mappings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Failed to load user mappings" })),
            )
                .into_response()
        }
    }
}

async fn add_mapping(
    State(state): State<AppState>,
    Json(payload): Json<MappingPayload>,
) -> Response {
    match state
        .mappings
        .add_mapping(&payload.user_email, &payload.assistant_id)
        .await
    {
        Ok(true) => (StatusCode::CREATED, Json(json!({ "ok": true }))).into_response(),
        Ok(false) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "message": "Mapping store rejected the mapping" })),
        )
            .into_response(),
        Err(e) => {
            warn!("failed to add mapping: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Failed to add user mapping" })),
            )
                .into_response()
        }
    }
}

async fn remove_mapping(
    State(state): State<AppState>,
    Query(payload): Query<MappingPayload>,
) -> Response {
    match state
        .mappings
        .remove_mapping(&payload.user_email, &payload.assistant_id)
        .await
    {
        Ok(true) => Json(json!({ "ok": true })).into_response(),
        Ok(false) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "message": "Mapping store rejected the removal" })),
        )
            .into_response(),
        Err(e) => {
            warn!("failed to remove mapping: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Failed to remove user mapping" })),
            )
                .into_response()
        }
    }
}
