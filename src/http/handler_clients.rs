//! Handles POST /createClient and DELETE /clients/{client_id} - API client provisioning

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::{
    context::AppState,
    utils_oauth::{ErrorResponse, error_response, server_error},
};
use crate::errors::ClientManagementError;
use crate::oauth::{CreateClientRequest, CreateClientResponse, DeleteClientRequest};

fn client_error_response(e: ClientManagementError) -> ErrorResponse {
    let (status, error_code) = e.status_and_code();
    if status.is_server_error() {
        return server_error(e);
    }
    error_response(status, error_code, e.to_string())
}

pub async fn create_client_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateClientResponse>), ErrorResponse> {
    let Json(request) = payload.map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            "invalid_client_metadata",
            e.body_text(),
        )
    })?;

    state
        .client_service
        .create_client(request)
        .await
        .map(|response| (StatusCode::CREATED, Json(response)))
        .map_err(client_error_response)
}

pub async fn delete_client_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    payload: Result<Json<DeleteClientRequest>, JsonRejection>,
) -> Result<StatusCode, ErrorResponse> {
    let Json(request) = payload.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, "invalid_request", e.body_text())
    })?;

    state
        .client_service
        .delete_client(&client_id, &request.client_secret)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(client_error_response)
}
