//! Token issuers used by the login flow.
//!
//! The login flow hands a synthetic password-grant request to a [`TokenIssuer`]
//! and receives the serialized token payload back, exactly as an HTTP token
//! endpoint would answer it.

use async_trait::async_trait;
use url::Url;

use crate::errors::OAuthError;
use crate::oauth::auth_server::LocalTokenIssuer;
use crate::oauth::types::{OAuthErrorResponse, PasswordGrantRequest, TokenRequest};

/// Exchanges a password grant for a serialized token payload
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, request: &PasswordGrantRequest) -> Result<String, OAuthError>;
}

#[async_trait]
impl TokenIssuer for LocalTokenIssuer {
    async fn issue(&self, request: &PasswordGrantRequest) -> Result<String, OAuthError> {
        let response = self
            .token(TokenRequest::from(request.clone()), None)
            .await?;
        serde_json::to_string(&response)
            .map_err(|e| OAuthError::ServerError(format!("Failed to serialize token: {}", e)))
    }
}

/// Forwards password grants to an external OAuth token endpoint
pub struct RemoteTokenIssuer {
    http_client: reqwest::Client,
    token_endpoint: Url,
}

impl RemoteTokenIssuer {
    pub fn new(http_client: reqwest::Client, token_endpoint: Url) -> Self {
        Self {
            http_client,
            token_endpoint,
        }
    }
}

#[async_trait]
impl TokenIssuer for RemoteTokenIssuer {
    async fn issue(&self, request: &PasswordGrantRequest) -> Result<String, OAuthError> {
        tracing::debug!(endpoint = %self.token_endpoint, ?request, "forwarding password grant");

        let response = self
            .http_client
            .post(self.token_endpoint.clone())
            .form(request)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            OAuthError::TokenExchangeFailed(format!("Failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            let description = serde_json::from_str::<OAuthErrorResponse>(&body)
                .map(|error| {
                    format!(
                        "{}: {}",
                        error.error,
                        error.error_description.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(OAuthError::TokenExchangeFailed(description));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::normalizer::normalize;
    use crate::oauth::password::{Argon2PasswordHasher, PasswordHasher};
    use crate::oauth::types::{Client, GrantType, Role, User, generate_id};
    use crate::storage::MemoryBileMoStorage;
    use crate::storage::traits::{ClientStore, UserStore};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_local_issuer_serializes_token_payload() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let hasher = Arc::new(Argon2PasswordHasher::with_params(1024, 1, 1).unwrap());

        let client = Client {
            id: generate_id(),
            random_id: "rnd".to_string(),
            secret: "s3cret".to_string(),
            name: None,
            redirect_uris: vec![],
            allowed_grant_types: vec![GrantType::Password],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        storage.store_client(&client).await.unwrap();
        storage
            .store_user(&User {
                id: generate_id(),
                username: "bob".to_string(),
                email: "bob@x.io".to_string(),
                email_canonical: "bob@x.io".to_string(),
                password: hasher.hash("pw1").unwrap(),
                enabled: true,
                role: Role::User,
                client_id: Some(client.id.clone()),
                confirmation_token: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let issuer: Arc<dyn TokenIssuer> = Arc::new(LocalTokenIssuer::new(
            storage,
            hasher,
            Duration::hours(1),
            Duration::days(14),
        ));

        let request = PasswordGrantRequest {
            client_id: client.public_id(),
            client_secret: "s3cret".to_string(),
            grant_type: GrantType::Password,
            username: "bob".to_string(),
            password: "pw1".to_string(),
            scope: "ROLE_USER".to_string(),
        };
        let raw = issuer.issue(&request).await.unwrap();
        let response = normalize(&raw).unwrap();
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.scope.as_deref(), Some("ROLE_USER"));
        assert!(response.refresh_token.is_some());

        let bad = PasswordGrantRequest {
            password: "wrong".to_string(),
            ..request
        };
        assert!(matches!(
            issuer.issue(&bad).await,
            Err(OAuthError::InvalidGrant(_))
        ));
    }
}
