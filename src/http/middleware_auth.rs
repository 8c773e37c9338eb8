//! Access token authentication for user endpoints.
//!
//! Accepts the token from the `X-AUTH-TOKEN` header or from
//! `Authorization: Bearer <token>`.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use super::utils_oauth::error_response;
use crate::oauth::types::AccessToken;
use crate::storage::traits::{AccessTokenStore, BileMoStorage};

/// Header carrying the access token
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Authenticated caller extractor for protected endpoints
///
/// Resolves the stored, unexpired access token presented with the request.
///
/// ```ignore
/// async fn protected_handler(ExtractedAuth(token): ExtractedAuth) -> String {
///     token.client_id
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ExtractedAuth(pub AccessToken);

fn unauthorized(description: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, "invalid_token", description).into_response()
}

fn presented_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    // Split only on first space; the scheme is case-insensitive
    let authorization = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    let (scheme, token) = authorization.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim().to_string()).filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for ExtractedAuth
where
    Arc<dyn BileMoStorage>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let storage: Arc<dyn BileMoStorage> = FromRef::from_ref(state);

        let access_token =
            presented_token(parts).ok_or_else(|| unauthorized("Missing access token"))?;

        let stored_token = storage
            .get_token(&access_token)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "access token lookup failed");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "Internal server error",
                )
                .into_response()
            })?
            .ok_or_else(|| unauthorized("Access token not found or expired"))?;

        if stored_token.is_expired(Utc::now()) {
            return Err(unauthorized("Access token not found or expired"));
        }

        Ok(ExtractedAuth(stored_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/user/1");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_presented_token_sources() {
        assert_eq!(
            presented_token(&parts(&[("X-AUTH-TOKEN", "abc")])).as_deref(),
            Some("abc")
        );
        assert_eq!(
            presented_token(&parts(&[("Authorization", "Bearer xyz")])).as_deref(),
            Some("xyz")
        );
        assert_eq!(
            presented_token(&parts(&[("Authorization", "bearer xyz")])).as_deref(),
            Some("xyz")
        );
        assert_eq!(
            presented_token(&parts(&[
                ("X-AUTH-TOKEN", "abc"),
                ("Authorization", "Bearer xyz")
            ]))
            .as_deref(),
            Some("abc")
        );
        assert!(presented_token(&parts(&[("Authorization", "Basic Zm9vOmJhcg==")])).is_none());
        assert!(presented_token(&parts(&[])).is_none());
    }
}
