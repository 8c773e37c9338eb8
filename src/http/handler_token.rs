//! Handles POST /oauth/v2/token - Password and refresh token grants

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, StatusCode},
};

use super::{
    context::AppState,
    utils_oauth::{ErrorResponse, error_response},
};
use crate::errors::OAuthError;
use crate::oauth::{
    auth_server::{TokenForm, extract_client_auth},
    types::{TokenRequest, TokenResponse},
};

pub async fn handle_oauth_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Json<TokenResponse>, ErrorResponse> {
    let Form(form) = form.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, "invalid_request", e.body_text())
    })?;

    // Extract client authentication from Authorization header or form
    let client_auth = extract_client_auth(&headers, &form);

    let request = TokenRequest::try_from(form).map_err(oauth_error_response)?;

    state
        .token_server
        .token(request, client_auth)
        .await
        .map(Json)
        .map_err(oauth_error_response)
}

fn oauth_error_response(e: OAuthError) -> ErrorResponse {
    let (status, error_code) = e.status_and_code();
    if status.is_server_error() {
        tracing::error!(error = ?e, "token request failed");
        return error_response(status, error_code, "Internal server error");
    }
    error_response(status, error_code, e.to_string())
}
