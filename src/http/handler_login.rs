//! Handles POST /login - Per-client user login and token issuance

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use super::{
    context::AppState,
    utils_oauth::{ErrorResponse, error_response},
};
use crate::errors::RegistrationError;
use crate::oauth::{RegistrationRequest, TokenResponse};

pub async fn handle_login(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, "invalid_request", e.body_text())
    })?;

    tracing::debug!(?request, "login request");

    match state.registration_service.register(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let (status, error_code) = e.status_and_code();
            // Failures after validation carry no detail for the caller
            let description = match e {
                RegistrationError::InvalidCredentials | RegistrationError::TokenExpired => {
                    RegistrationError::RegistrationFailed.to_string()
                }
                other => other.to_string(),
            };
            Err(error_response(status, error_code, description))
        }
    }
}
