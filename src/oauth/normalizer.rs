//! Builds the public token response from issuer payloads or stored tokens.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::OAuthError;
use crate::oauth::types::{
    AccessToken, OAuthErrorResponse, RefreshToken, TokenResponse, TokenType,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum IssuerPayload {
    Token(TokenResponse),
    Error(OAuthErrorResponse),
}

/// Parse a serialized token payload into a [`TokenResponse`].
///
/// OAuth error payloads and anything that is not a bearer token response are errors.
pub fn normalize(raw: &str) -> Result<TokenResponse, OAuthError> {
    let payload: IssuerPayload = serde_json::from_str(raw)
        .map_err(|e| OAuthError::TokenExchangeFailed(format!("Malformed token payload: {}", e)))?;

    match payload {
        IssuerPayload::Token(response) => Ok(response),
        IssuerPayload::Error(error) => Err(OAuthError::InvalidGrant(format!(
            "{}: {}",
            error.error,
            error.error_description.unwrap_or_default()
        ))),
    }
}

/// Rebuild a [`TokenResponse`] from stored tokens, counting `expires_in` from `now`
pub fn rebuild(
    access_token: &AccessToken,
    refresh_token: Option<&RefreshToken>,
    now: DateTime<Utc>,
) -> TokenResponse {
    let remaining = (access_token.expires_at - now).num_seconds().max(0);
    TokenResponse {
        access_token: access_token.token.clone(),
        expires_in: remaining as u64,
        token_type: TokenType::Bearer,
        scope: access_token.scope.clone(),
        refresh_token: refresh_token.map(|t| t.token.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_normalize_issuer_payload() {
        let raw = r#"{
            "access_token": "at-1",
            "expires_in": 3600,
            "token_type": "bearer",
            "scope": "ROLE_USER",
            "refresh_token": "rt-1"
        }"#;
        let response = normalize(raw).unwrap();
        assert_eq!(response.access_token, "at-1");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.token_type, TokenType::Bearer);
        assert_eq!(response.scope.as_deref(), Some("ROLE_USER"));
        assert_eq!(response.refresh_token.as_deref(), Some("rt-1"));
    }

    #[test]
    fn test_normalize_accepts_capitalized_bearer_and_missing_optionals() {
        let response =
            normalize(r#"{"access_token":"at","expires_in":60,"token_type":"Bearer"}"#).unwrap();
        assert!(response.scope.is_none());
        assert!(response.refresh_token.is_none());
    }

    #[test]
    fn test_normalize_error_payload() {
        let raw = r#"{"error":"invalid_grant","error_description":"Invalid username and password combination"}"#;
        assert!(matches!(normalize(raw), Err(OAuthError::InvalidGrant(_))));
    }

    #[test]
    fn test_normalize_garbage() {
        assert!(matches!(
            normalize("<html>oops</html>"),
            Err(OAuthError::TokenExchangeFailed(_))
        ));
        assert!(matches!(
            normalize(r#"{"access_token":"at","token_type":"mac","expires_in":1}"#),
            Err(OAuthError::TokenExchangeFailed(_))
        ));
    }

    #[test]
    fn test_rebuild_counts_remaining_seconds() {
        let now = Utc::now();
        let access = AccessToken {
            token: "at".to_string(),
            token_type: TokenType::Bearer,
            client_id: "c1".to_string(),
            user_id: Some("u1".to_string()),
            scope: Some("ROLE_USER".to_string()),
            created_at: now - Duration::minutes(10),
            expires_at: now + Duration::minutes(50),
        };
        let refresh = RefreshToken {
            token: "rt".to_string(),
            access_token: "at".to_string(),
            client_id: "c1".to_string(),
            user_id: "u1".to_string(),
            scope: Some("ROLE_USER".to_string()),
            created_at: now,
            expires_at: now + Duration::days(14),
        };

        let response = rebuild(&access, Some(&refresh), now);
        assert_eq!(response.expires_in, 3000);
        assert_eq!(response.token_type, TokenType::Bearer);
        assert_eq!(response.refresh_token.as_deref(), Some("rt"));

        let expired = rebuild(&access, None, now + Duration::hours(2));
        assert_eq!(expired.expires_in, 0);
        assert!(expired.refresh_token.is_none());
    }
}
