//! Per-client login: resolves the client and the user, then obtains a token.
//!
//! A login either creates the user under the authenticating client, or finds an
//! existing account (moving it to that client when needed). When the account's
//! last issued access token is still valid it is returned again instead of
//! asking the token issuer for a new one.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::errors::RegistrationError;
use crate::oauth::credentials::CredentialValidator;
use crate::oauth::issuer::TokenIssuer;
use crate::oauth::normalizer::{normalize, rebuild};
use crate::oauth::types::{
    Client, GrantType, PasswordGrantRequest, SecretBearing, TokenResponse, User,
};
use crate::oauth::users::UserResolver;
use crate::storage::traits::{AccessTokenStore, BileMoStorage, RefreshTokenStore, UserStore};

/// Body of `POST /login`
#[derive(Clone, Default, Deserialize)]
pub struct RegistrationRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(rename = "clientName")]
    pub client_name: Option<String>,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .finish_non_exhaustive()
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, RegistrationError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(RegistrationError::MissingField(field))
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn registration_failed(error: impl fmt::Display) -> RegistrationError {
    tracing::error!(error = %error, "login failed");
    RegistrationError::RegistrationFailed
}

/// Orchestrates the login flow
#[derive(Clone)]
pub struct RegistrationService {
    storage: Arc<dyn BileMoStorage>,
    validator: CredentialValidator,
    resolver: UserResolver,
    issuer: Arc<dyn TokenIssuer>,
    login_scope: String,
}

impl RegistrationService {
    pub fn new(
        storage: Arc<dyn BileMoStorage>,
        resolver: UserResolver,
        issuer: Arc<dyn TokenIssuer>,
        login_scope: String,
    ) -> Self {
        Self {
            validator: CredentialValidator::new(storage.clone()),
            storage,
            resolver,
            issuer,
            login_scope,
        }
    }

    /// Run the login flow and return the token response for the user
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<TokenResponse, RegistrationError> {
        let username = required(&request.username, "username")?;
        let email = required(&request.email, "email")?;
        let password = required(&request.password, "password")?;

        let has_credentials = has_value(&request.client_id) && has_value(&request.client_secret);
        if !has_credentials && !has_value(&request.client_name) {
            return Err(RegistrationError::MissingClientIdentification);
        }

        let client = self
            .validator
            .resolve_client(
                request.client_id.as_deref(),
                request.client_secret.as_deref(),
                request.client_name.as_deref(),
            )
            .await?;

        let resolved = self
            .resolver
            .resolve_or_create(username, email, password, &client)
            .await
            .map_err(|e| match e {
                RegistrationError::InvalidCredentials => {
                    tracing::info!(client_id = %client.id, "login rejected: invalid credentials");
                    RegistrationError::RegistrationFailed
                }
                other => other,
            })?;

        let is_existing = resolved.is_existing();
        let mut user = resolved.user;
        if is_existing {
            match self.stored_response(&user, &client).await {
                Ok(Some(response)) => {
                    tracing::debug!(user_id = %user.id, "reusing stored access token");
                    return Ok(response);
                }
                Ok(None) => {}
                Err(RegistrationError::TokenExpired) => {
                    tracing::debug!(user_id = %user.id, "stored access token expired");
                }
                Err(e) => return Err(e),
            }
        }

        let grant = PasswordGrantRequest {
            client_id: client.public_id(),
            client_secret: client.secret().to_string(),
            grant_type: GrantType::Password,
            username: user.username.clone(),
            password: password.to_string(),
            scope: self.login_scope.clone(),
        };

        let raw = self
            .issuer
            .issue(&grant)
            .await
            .map_err(registration_failed)?;
        let response = normalize(&raw).map_err(registration_failed)?;

        user.confirmation_token = Some(response.access_token.clone());
        user.updated_at = Utc::now();
        self.storage
            .update_user(&user)
            .await
            .map_err(registration_failed)?;

        tracing::info!(user_id = %user.id, client_id = %client.id, "user logged in");
        Ok(response)
    }

    /// Rebuild the response from the user's stashed access token.
    ///
    /// A stashed token that can no longer be reused is revoked together with its
    /// refresh token: `TokenExpired` when it expired or was already cleaned up,
    /// `Ok(None)` when it was issued to the user's previous client.
    async fn stored_response(
        &self,
        user: &User,
        client: &Client,
    ) -> Result<Option<TokenResponse>, RegistrationError> {
        let Some(stashed) = user.confirmation_token.as_deref() else {
            return Ok(None);
        };

        let access_token = self
            .storage
            .get_token(stashed)
            .await
            .map_err(registration_failed)?;
        if let Some(token) = &access_token {
            if token.user_id.as_deref() != Some(user.id.as_str()) {
                return Ok(None);
            }
        }

        let refresh_token = self
            .storage
            .find_refresh_token_for_access_token(stashed)
            .await
            .map_err(registration_failed)?
            .filter(|token| token.user_id == user.id);

        let now = Utc::now();
        let moved = match &access_token {
            Some(token) if token.client_id != client.id => true,
            Some(token) if !token.is_expired(now) => {
                return Ok(Some(rebuild(token, refresh_token.as_ref(), now)));
            }
            _ => false,
        };

        if access_token.is_some() {
            self.storage
                .revoke_token(stashed)
                .await
                .map_err(registration_failed)?;
        }
        if let Some(refresh_token) = refresh_token {
            self.storage
                .revoke_refresh_token(&refresh_token.token)
                .await
                .map_err(registration_failed)?;
        }

        if moved {
            tracing::debug!(user_id = %user.id, "revoked token issued to previous client");
            Ok(None)
        } else {
            Err(RegistrationError::TokenExpired)
        }
    }
}
