//! Client provisioning and removal.
//!
//! Creates API clients with generated credentials and deletes them after a
//! compound-key ownership check.

use crate::errors::{ClientManagementError, StorageError};
use crate::oauth::types::*;
use crate::storage::traits::{BileMoStorage, ClientStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Body of `POST /createClient`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateClientRequest {
    #[serde(rename = "redirect-uri")]
    pub redirect_uri: Option<String>,
    #[serde(rename = "grant-type")]
    pub grant_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Credentials handed back to a newly created client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClientResponse {
    pub client_id: String,
    pub client_secret: String,
}

/// Body of `DELETE /clients/{client_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteClientRequest {
    pub client_secret: String,
}

/// Client provisioning service
pub struct ClientService {
    storage: Arc<dyn BileMoStorage>,
}

impl ClientService {
    pub fn new(storage: Arc<dyn BileMoStorage>) -> Self {
        Self { storage }
    }

    /// Create a client allowed to use the requested grant type
    pub async fn create_client(
        &self,
        request: CreateClientRequest,
    ) -> Result<CreateClientResponse, ClientManagementError> {
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ClientManagementError::InvalidRedirectUri("redirect-uri missing".to_string())
            })?;
        validate_redirect_uri(redirect_uri)?;

        let grant_type = request
            .grant_type
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ClientManagementError::InvalidClientMetadata("grant-type missing".to_string())
            })?
            .parse::<GrantType>()
            .map_err(|value| {
                ClientManagementError::InvalidClientMetadata(format!(
                    "Unsupported grant-type: {}",
                    value
                ))
            })?;

        let name = request.name.filter(|name| !name.is_empty());
        if let Some(ref name) = name {
            if self.storage.find_client_by_name(name).await?.is_some() {
                return Err(ClientManagementError::NameTaken(name.clone()));
            }
        }

        let mut allowed_grant_types = vec![grant_type.clone()];
        if grant_type == GrantType::Password {
            allowed_grant_types.push(GrantType::RefreshToken);
        }

        let now = Utc::now();
        let client = Client {
            id: generate_id(),
            random_id: generate_random_id(),
            secret: generate_token(),
            name: name.clone(),
            redirect_uris: vec![redirect_uri.to_string()],
            allowed_grant_types,
            created_at: now,
            updated_at: now,
        };

        self.storage
            .store_client(&client)
            .await
            .map_err(|e| match e {
                StorageError::Duplicate(_) => {
                    ClientManagementError::NameTaken(name.clone().unwrap_or_default())
                }
                other => ClientManagementError::Storage(other),
            })?;

        tracing::info!(client_id = %client.id, name = ?client.name, "created client");

        Ok(CreateClientResponse {
            client_id: client.public_id(),
            client_secret: client.secret,
        })
    }

    /// Delete the client identified by `public_id` once its secret checks out.
    ///
    /// The client's tokens are removed and its users detached.
    pub async fn delete_client(
        &self,
        public_id: &str,
        client_secret: &str,
    ) -> Result<(), ClientManagementError> {
        let key = ClientKey::parse(public_id)
            .ok_or_else(|| ClientManagementError::ClientNotFound(public_id.to_string()))?;

        let client = self
            .storage
            .get_client(&key.id)
            .await?
            .ok_or_else(|| ClientManagementError::ClientNotFound(public_id.to_string()))?;

        if client.random_id != key.random_id || !client.secret_matches(client_secret) {
            tracing::warn!(client_id = %client.id, "client deletion refused");
            return Err(ClientManagementError::OwnershipMismatch);
        }

        self.storage.delete_client(&client.id).await?;
        tracing::info!(client_id = %client.id, "deleted client");
        Ok(())
    }
}

/// Redirect URIs must be absolute http(s) URLs
fn validate_redirect_uri(uri: &str) -> Result<(), ClientManagementError> {
    let parsed = Url::parse(uri).map_err(|e| {
        ClientManagementError::InvalidRedirectUri(format!("Invalid URI format: {}", e))
    })?;

    match parsed.scheme() {
        "https" | "http" => {}
        scheme => {
            return Err(ClientManagementError::InvalidRedirectUri(format!(
                "Unsupported scheme: {}",
                scheme
            )));
        }
    }

    if parsed.fragment().is_some() {
        return Err(ClientManagementError::InvalidRedirectUri(
            "Fragment not allowed in redirect URI".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::User;
    use crate::storage::MemoryBileMoStorage;
    use crate::storage::traits::{AccessTokenStore, UserStore};

    fn create_request(grant_type: &str, name: Option<&str>) -> CreateClientRequest {
        CreateClientRequest {
            redirect_uri: Some("https://acme.example/callback".to_string()),
            grant_type: Some(grant_type.to_string()),
            name: name.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_password_client() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let service = ClientService::new(storage.clone());

        let created = service
            .create_client(create_request("password", Some("acme")))
            .await
            .unwrap();

        let client = storage
            .find_client_by_public_id(&created.client_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.secret, created.client_secret);
        assert_eq!(client.random_id.len(), 40);
        assert_eq!(
            client.allowed_grant_types,
            vec![GrantType::Password, GrantType::RefreshToken]
        );
        assert_eq!(client.name.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_create_client_validation() {
        let service = ClientService::new(Arc::new(MemoryBileMoStorage::new()));

        let missing_uri = CreateClientRequest {
            redirect_uri: None,
            ..create_request("password", None)
        };
        assert!(matches!(
            service.create_client(missing_uri).await,
            Err(ClientManagementError::InvalidRedirectUri(_))
        ));

        let relative = CreateClientRequest {
            redirect_uri: Some("/callback".to_string()),
            ..create_request("password", None)
        };
        assert!(matches!(
            service.create_client(relative).await,
            Err(ClientManagementError::InvalidRedirectUri(_))
        ));

        let missing_grant = CreateClientRequest {
            grant_type: None,
            ..create_request("password", None)
        };
        assert!(matches!(
            service.create_client(missing_grant).await,
            Err(ClientManagementError::InvalidClientMetadata(_))
        ));

        assert!(matches!(
            service.create_client(create_request("implicit", None)).await,
            Err(ClientManagementError::InvalidClientMetadata(_))
        ));
    }

    #[tokio::test]
    async fn test_name_must_be_unique() {
        let service = ClientService::new(Arc::new(MemoryBileMoStorage::new()));
        service
            .create_client(create_request("client_credentials", Some("acme")))
            .await
            .unwrap();
        assert!(matches!(
            service
                .create_client(create_request("password", Some("acme")))
                .await,
            Err(ClientManagementError::NameTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_client_checks_compound_key() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let service = ClientService::new(storage.clone());
        let created = service
            .create_client(create_request("password", None))
            .await
            .unwrap();
        let key = ClientKey::parse(&created.client_id).unwrap();

        let forged = format!("{}_{}", key.id, "not-the-random-id");
        assert!(matches!(
            service.delete_client(&forged, &created.client_secret).await,
            Err(ClientManagementError::OwnershipMismatch)
        ));
        assert!(matches!(
            service.delete_client(&created.client_id, "wrong").await,
            Err(ClientManagementError::OwnershipMismatch)
        ));
        assert!(matches!(
            service.delete_client("unknown_id", "wrong").await,
            Err(ClientManagementError::ClientNotFound(_))
        ));
        assert!(matches!(
            service.delete_client("no-separator", "wrong").await,
            Err(ClientManagementError::ClientNotFound(_))
        ));

        let now = Utc::now();
        let user = User {
            id: "u1".to_string(),
            username: "bob".to_string(),
            email: "bob@x.io".to_string(),
            email_canonical: "bob@x.io".to_string(),
            password: "hash".to_string(),
            enabled: true,
            role: Role::User,
            client_id: Some(key.id.clone()),
            confirmation_token: Some("at".to_string()),
            created_at: now,
            updated_at: now,
        };
        storage.store_user(&user).await.unwrap();
        storage
            .store_token(&AccessToken {
                token: "at".to_string(),
                token_type: TokenType::Bearer,
                client_id: key.id.clone(),
                user_id: Some("u1".to_string()),
                scope: None,
                created_at: now,
                expires_at: now + chrono::Duration::hours(1),
            })
            .await
            .unwrap();

        service
            .delete_client(&created.client_id, &created.client_secret)
            .await
            .unwrap();

        assert!(storage.get_client(&key.id).await.unwrap().is_none());
        assert!(storage.get_token("at").await.unwrap().is_none());
        let detached = storage.get_user("u1").await.unwrap().unwrap();
        assert!(detached.client_id.is_none());
    }
}
