//! Handles the per-client user endpoints: GET/DELETE /user/{id} and GET /users/{client_id}

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::{
    context::AppState,
    middleware_auth::ExtractedAuth,
    utils_oauth::{ErrorResponse, error_response, server_error},
};
use crate::errors::UserAccessError;
use crate::oauth::{UserListParams, UserListResponse, UserView};
use crate::storage::traits::UserListQuery;

fn user_error_response(e: UserAccessError) -> ErrorResponse {
    let (status, error_code) = e.status_and_code();
    if status.is_server_error() {
        return server_error(e);
    }
    error_response(status, error_code, e.to_string())
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    ExtractedAuth(caller): ExtractedAuth,
    Path(user_id): Path<String>,
) -> Result<Json<UserView>, ErrorResponse> {
    state
        .user_access_service
        .get_user(&caller, &user_id)
        .await
        .map(Json)
        .map_err(user_error_response)
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    ExtractedAuth(caller): ExtractedAuth,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    state
        .user_access_service
        .delete_user(&caller, &user_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(user_error_response)
}

pub async fn list_users_handler(
    State(state): State<AppState>,
    ExtractedAuth(caller): ExtractedAuth,
    Path(client_id): Path<String>,
    Query(params): Query<UserListParams>,
) -> Result<Json<UserListResponse>, ErrorResponse> {
    let query = UserListQuery::try_from(params).map_err(user_error_response)?;

    state
        .user_access_service
        .list_users(&caller, &client_id, query)
        .await
        .map(Json)
        .map_err(user_error_response)
}
