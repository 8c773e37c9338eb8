//! Storage trait definitions for clients, users and OAuth tokens.
//!
//! Defines async storage interfaces that can be implemented by various
//! backend providers. Every backend enforces uniqueness of client names,
//! usernames and emails and reports violations as [`StorageError::Duplicate`].

use crate::errors::StorageError;
use crate::oauth::types::*;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Sort direction for user listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Paging window for user listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserListQuery {
    pub order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self {
            order: SortOrder::Ascending,
            limit: 20,
            offset: 0,
        }
    }
}

/// One page of users together with the unpaged total
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: usize,
}

/// Trait for storing and retrieving API clients
#[async_trait]
pub trait ClientStore {
    /// Store a new client
    async fn store_client(&self, client: &Client) -> Result<()>;

    /// Retrieve a client by internal ID
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>>;

    /// Retrieve a client by its unique name
    async fn find_client_by_name(&self, name: &str) -> Result<Option<Client>>;

    /// Delete a client, its tokens, and detach its users
    async fn delete_client(&self, client_id: &str) -> Result<()>;

    /// Retrieve a client by its public `"{id}_{random_id}"` identifier
    async fn find_client_by_public_id(&self, public_id: &str) -> Result<Option<Client>> {
        let Some(key) = ClientKey::parse(public_id) else {
            return Ok(None);
        };
        Ok(self
            .get_client(&key.id)
            .await?
            .filter(|client| client.random_id == key.random_id))
    }
}

/// Trait for storing and retrieving user accounts
#[async_trait]
pub trait UserStore {
    /// Insert a new user
    async fn store_user(&self, user: &User) -> Result<()>;

    /// Update an existing user
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Retrieve a user by ID
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Retrieve the user matching all of owning client, username and email
    async fn find_user_by_identity(
        &self,
        client_id: &str,
        username: &str,
        email: &str,
    ) -> Result<Option<User>>;

    /// Retrieve a user by email, regardless of owning client
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Retrieve a user by username, regardless of owning client
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Delete a user together with their tokens
    async fn delete_user(&self, user_id: &str) -> Result<()>;

    /// List users owned by a client, ordered by username
    async fn list_client_users(&self, client_id: &str, query: &UserListQuery) -> Result<UserPage>;
}

/// Trait for storing and retrieving access tokens
#[async_trait]
pub trait AccessTokenStore {
    /// Store a new access token
    async fn store_token(&self, token: &AccessToken) -> Result<()>;

    /// Retrieve an access token, including expired ones
    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>>;

    /// Revoke a token
    async fn revoke_token(&self, token: &str) -> Result<()>;

    /// Clean up expired access tokens
    async fn cleanup_expired_tokens(&self) -> Result<usize>;
}

/// Trait for storing and retrieving refresh tokens
#[async_trait]
pub trait RefreshTokenStore {
    /// Store a new refresh token
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()>;

    /// Retrieve a refresh token without consuming it
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Retrieve the refresh token issued alongside an access token
    async fn find_refresh_token_for_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshToken>>;

    /// Retrieve and consume a refresh token
    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Revoke a refresh token
    async fn revoke_refresh_token(&self, token: &str) -> Result<()>;

    /// Clean up expired refresh tokens
    async fn cleanup_expired_refresh_tokens(&self) -> Result<usize>;
}

/// Combined storage trait for the whole application
pub trait BileMoStorage:
    ClientStore + UserStore + AccessTokenStore + RefreshTokenStore + Send + Sync
{
}

impl<T> BileMoStorage for T where
    T: ClientStore + UserStore + AccessTokenStore + RefreshTokenStore + Send + Sync
{
}
