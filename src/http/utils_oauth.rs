//! JSON error bodies shared by the HTTP handlers.

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

/// Error response as returned by every handler
pub(crate) type ErrorResponse = (StatusCode, Json<Value>);

/// Build an `{error, error_description}` body
pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    error_description: impl Into<String>,
) -> ErrorResponse {
    let body = json!({
        "error": error,
        "error_description": error_description.into()
    });
    (status, Json(body))
}

/// Log server-side failures and hide their detail from the caller
pub(crate) fn server_error(error: impl std::fmt::Display) -> ErrorResponse {
    tracing::error!(error = %error, "request failed");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "server_error",
        "Internal server error",
    )
}
