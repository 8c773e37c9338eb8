//! Client credential validation for the login flow.
//!
//! A client is identified either by its public identifier plus secret, or by its
//! unique name. Secrets are compared in constant time.

use std::sync::Arc;

use crate::errors::RegistrationError;
use crate::oauth::types::{Client, SecretBearing};
use crate::storage::traits::{BileMoStorage, ClientStore};

/// Resolves the owning client of a login request
#[derive(Clone)]
pub struct CredentialValidator {
    storage: Arc<dyn BileMoStorage>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl CredentialValidator {
    pub fn new(storage: Arc<dyn BileMoStorage>) -> Self {
        Self { storage }
    }

    /// Resolve a client from `client_id` + `client_secret`, or from `client_name`.
    ///
    /// Empty strings count as absent. Performs no writes.
    pub async fn resolve_client(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
        client_name: Option<&str>,
    ) -> Result<Client, RegistrationError> {
        match (
            present(client_id),
            present(client_secret),
            present(client_name),
        ) {
            (Some(client_id), Some(client_secret), _) => {
                let client = self
                    .storage
                    .find_client_by_public_id(client_id)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = ?e, "client lookup by id failed");
                        RegistrationError::RegistrationFailed
                    })?
                    .ok_or_else(|| RegistrationError::ClientNotFound(client_id.to_string()))?;

                if !client.secret_matches(client_secret) {
                    tracing::warn!(client_id = %client_id, "client secret mismatch");
                    return Err(RegistrationError::ClientMismatch);
                }
                Ok(client)
            }
            (_, _, Some(client_name)) => self
                .storage
                .find_client_by_name(client_name)
                .await
                .map_err(|e| {
                    tracing::error!(error = ?e, "client lookup by name failed");
                    RegistrationError::RegistrationFailed
                })?
                .ok_or_else(|| RegistrationError::ClientNotFound(client_name.to_string())),
            _ => Err(RegistrationError::MissingClientIdentification),
        }
    }
}
