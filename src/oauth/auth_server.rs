//! In-process OAuth 2.0 token server handling the password and refresh token grants.

use crate::errors::OAuthError;
use crate::oauth::password::PasswordHasher;
use crate::oauth::types::*;
use crate::storage::traits::{AccessTokenStore, BileMoStorage, ClientStore, RefreshTokenStore, UserStore};
use base64::prelude::*;
use chrono::{Duration, Utc};
use http::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;

/// Token server issuing opaque bearer tokens from the local store
pub struct LocalTokenIssuer {
    pub storage: Arc<dyn BileMoStorage>,
    hasher: Arc<dyn PasswordHasher>,
    /// Access token lifetime
    access_token_lifetime: Duration,
    /// Refresh token lifetime
    refresh_token_lifetime: Duration,
}

impl LocalTokenIssuer {
    /// Create a new token issuer
    pub fn new(
        storage: Arc<dyn BileMoStorage>,
        hasher: Arc<dyn PasswordHasher>,
        access_token_lifetime: Duration,
        refresh_token_lifetime: Duration,
    ) -> Self {
        Self {
            storage,
            hasher,
            access_token_lifetime,
            refresh_token_lifetime,
        }
    }

    /// Handle token requests (RFC 6749 Sections 4.3 and 6)
    pub async fn token(
        &self,
        request: TokenRequest,
        client_auth: Option<ClientAuthentication>,
    ) -> Result<TokenResponse, OAuthError> {
        match request.grant_type {
            GrantType::Password => self.handle_password_grant(request, client_auth).await,
            GrantType::RefreshToken => self.handle_refresh_token_grant(request, client_auth).await,
            ref other => Err(OAuthError::UnsupportedGrantType(other.as_str().to_string())),
        }
    }

    /// Handle resource owner password credentials grant
    async fn handle_password_grant(
        &self,
        request: TokenRequest,
        client_auth: Option<ClientAuthentication>,
    ) -> Result<TokenResponse, OAuthError> {
        let client = self.authenticate_client(client_auth, &request).await?;

        let username = request
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| OAuthError::InvalidRequest("Missing username".to_string()))?;
        let password = request
            .password
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("Missing password".to_string()))?;

        let user = match self
            .storage
            .find_user_by_username(username)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
        {
            Some(user) => Some(user),
            None => self
                .storage
                .find_user_by_email(username)
                .await
                .map_err(|e| OAuthError::ServerError(e.to_string()))?,
        };

        let user = user
            .filter(|user| user.enabled && self.hasher.verify(user, password))
            .ok_or_else(|| {
                OAuthError::InvalidGrant("Invalid username and password combination".to_string())
            })?;

        self.mint_tokens(&client, &user.id, request.scope).await
    }

    /// Handle refresh token grant
    async fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
        client_auth: Option<ClientAuthentication>,
    ) -> Result<TokenResponse, OAuthError> {
        let refresh_token = request
            .refresh_token
            .clone()
            .ok_or_else(|| OAuthError::InvalidRequest("Missing refresh token".to_string()))?;

        let client = self.authenticate_client(client_auth, &request).await?;

        // Consume refresh token
        let refresh_token_record = self
            .storage
            .consume_refresh_token(&refresh_token)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid refresh token".to_string()))?;

        if refresh_token_record.client_id != client.id {
            return Err(OAuthError::InvalidGrant(
                "Refresh token was issued to another client".to_string(),
            ));
        }

        self.storage
            .revoke_token(&refresh_token_record.access_token)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?;

        let user = self
            .storage
            .get_user(&refresh_token_record.user_id)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .filter(|user| user.enabled)
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid refresh token".to_string()))?;

        self.mint_tokens(&client, &user.id, refresh_token_record.scope)
            .await
    }

    /// Generate, store and return a fresh access/refresh token pair
    async fn mint_tokens(
        &self,
        client: &Client,
        user_id: &str,
        scope: Option<String>,
    ) -> Result<TokenResponse, OAuthError> {
        let now = Utc::now();
        let access_token = AccessToken {
            token: generate_token(),
            token_type: TokenType::Bearer,
            client_id: client.id.clone(),
            user_id: Some(user_id.to_string()),
            scope: scope.clone(),
            created_at: now,
            expires_at: now + self.access_token_lifetime,
        };

        self.storage
            .store_token(&access_token)
            .await
            .map_err(|e| {
                OAuthError::ServerError(format!("Failed to store access token: {:?}", e))
            })?;

        let refresh_token = RefreshToken {
            token: generate_token(),
            access_token: access_token.token.clone(),
            client_id: client.id.clone(),
            user_id: user_id.to_string(),
            scope: scope.clone(),
            created_at: now,
            expires_at: now + self.refresh_token_lifetime,
        };

        self.storage
            .store_refresh_token(&refresh_token)
            .await
            .map_err(|e| {
                OAuthError::ServerError(format!("Failed to store refresh token: {:?}", e))
            })?;

        tracing::debug!(client_id = %client.id, user_id = %user_id, "issued token pair");

        Ok(TokenResponse {
            access_token: access_token.token,
            expires_in: self.access_token_lifetime.num_seconds().max(0) as u64,
            token_type: TokenType::Bearer,
            scope,
            refresh_token: Some(refresh_token.token),
        })
    }

    /// Authenticate a client and check that it may use the requested grant
    async fn authenticate_client(
        &self,
        client_auth: Option<ClientAuthentication>,
        request: &TokenRequest,
    ) -> Result<Client, OAuthError> {
        let client_id = client_auth
            .as_ref()
            .map(|auth| auth.client_id.clone())
            .or_else(|| request.client_id.clone())
            .ok_or_else(|| OAuthError::InvalidClient("Missing client_id".to_string()))?;

        let provided_secret = client_auth
            .as_ref()
            .and_then(|auth| auth.client_secret.clone())
            .or_else(|| request.client_secret.clone())
            .ok_or_else(|| OAuthError::InvalidClient("Missing client secret".to_string()))?;

        let client = self
            .storage
            .find_client_by_public_id(&client_id)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or_else(|| OAuthError::InvalidClient("Client not found".to_string()))?;

        if !client.secret_matches(&provided_secret) {
            return Err(OAuthError::InvalidClient(
                "Invalid client secret".to_string(),
            ));
        }

        if !client.allows_grant(&request.grant_type) {
            return Err(OAuthError::UnauthorizedClient(format!(
                "Grant type {} not allowed for this client",
                request.grant_type.as_str()
            )));
        }

        Ok(client)
    }
}

/// Client Authentication extracted from request
#[derive(Clone)]
pub struct ClientAuthentication {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Form data for token endpoint
#[derive(Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

impl TryFrom<TokenForm> for TokenRequest {
    type Error = OAuthError;

    fn try_from(form: TokenForm) -> Result<Self, Self::Error> {
        let grant_type = form
            .grant_type
            .parse::<GrantType>()
            .map_err(OAuthError::UnsupportedGrantType)?;

        Ok(Self {
            grant_type,
            client_id: form.client_id,
            client_secret: form.client_secret,
            username: form.username,
            password: form.password,
            refresh_token: form.refresh_token,
            scope: form.scope,
        })
    }
}

/// Extract client authentication from headers and form
pub fn extract_client_auth(headers: &HeaderMap, form: &TokenForm) -> Option<ClientAuthentication> {
    // Try Authorization header (HTTP Basic)
    let basic = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| BASE64_STANDARD.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok());

    if let Some(credentials) = basic {
        if let Some((client_id, client_secret)) = credentials.split_once(':') {
            return Some(ClientAuthentication {
                client_id: client_id.to_string(),
                client_secret: Some(client_secret.to_string()),
            });
        }
    }

    // Fall back to form parameters
    form.client_id.as_ref().map(|client_id| ClientAuthentication {
        client_id: client_id.clone(),
        client_secret: form.client_secret.clone(),
    })
}
