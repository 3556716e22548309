//! Capture store endpoints, mounted under the configured path.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, Method, Uri},
    response::IntoResponse,
    Json,
};

use super::ApiResult;
use crate::errors::AppError;
use crate::models::{
    CaptureStore, CreateCaptureRequest, CreateCaptureResponse, DeleteQuery, DeleteResponse,
    ReadQuery, SuccessResponse, UpdateRequest,
};
use crate::AppState;

/// In-page script served to the browser.
pub const CLIENT_SCRIPT: &str = include_str!("../../assets/client.js");

/// GET / - Read the store, clearing it unless `keep=true`.
pub async fn get_store(
    State(state): State<AppState>,
    query: Result<Query<ReadQuery>, QueryRejection>,
) -> ApiResult<CaptureStore> {
    let Query(query) = query?;
    let store = state
        .store
        .read_store(query.keep(), &query.consume_ids())
        .await?;
    Ok(Json(store))
}

/// GET /client.js - The in-page capture script.
pub async fn client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}

/// POST / - Record a capture.
pub async fn create_capture(
    State(state): State<AppState>,
    body: Result<Json<CreateCaptureRequest>, JsonRejection>,
) -> ApiResult<CreateCaptureResponse> {
    let Json(request) = body?;
    let response = state.store.create_capture(request).await?;
    Ok(Json(response))
}

/// PUT / - Update a comment or a session color.
pub async fn update(
    State(state): State<AppState>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<SuccessResponse> {
    let Json(request) = body?;
    let update = request.into_update().ok_or_else(|| {
        AppError::Validation("Expected {clickId, comment} or {sessionId, color}".to_string())
    })?;
    state.store.update(update).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// DELETE / - Delete one capture by `clickId`, or everything when it is omitted.
pub async fn delete(
    State(state): State<AppState>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> ApiResult<DeleteResponse> {
    let Query(query) = query?;
    // A present but blank id is a client bug, not a request to clear the store
    if query.click_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(AppError::Validation("clickId must not be empty".to_string()));
    }
    let response = state.store.delete(query.click_id.as_deref()).await?;
    Ok(Json(response))
}

/// Anything else under the mount.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    tracing::debug!("Unsupported {} {}", method, uri);
    AppError::MethodNotAllowed(format!("{} {} is not supported", method, uri.path()))
}
