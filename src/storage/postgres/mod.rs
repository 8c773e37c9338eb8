//! PostgreSQL storage implementations
//!
//! This module provides PostgreSQL-based implementations of all storage traits.
//! PostgreSQL is suitable for multi-instance production deployments.

mod access_tokens;
mod clients;
mod refresh_tokens;
mod users;

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow, Postgres};
use std::sync::Arc;

pub use access_tokens::PostgresAccessTokenStore;
pub use clients::PostgresClientStore;
pub use refresh_tokens::PostgresRefreshTokenStore;
pub use users::PostgresUserStore;

/// Read a typed column from a row
fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", name, e)))
}

/// Map an insert/update failure, reporting unique constraint violations as duplicates
fn map_write_error(error: sqlx::Error, operation: &str) -> StorageError {
    match error.as_database_error() {
        Some(db_error) if db_error.is_unique_violation() => StorageError::Duplicate(format!(
            "Failed to {}: {}",
            operation,
            db_error.constraint().unwrap_or("unique constraint")
        )),
        _ => StorageError::DatabaseError(format!("Failed to {}: {}", operation, error)),
    }
}

/// Comprehensive PostgreSQL storage implementation
pub struct PostgresBileMoStorage {
    pool: PgPool,
    client_store: Arc<PostgresClientStore>,
    user_store: Arc<PostgresUserStore>,
    access_token_store: Arc<PostgresAccessTokenStore>,
    refresh_token_store: Arc<PostgresRefreshTokenStore>,
}

impl PostgresBileMoStorage {
    /// Create a new PostgreSQL storage instance
    pub fn new(pool: PgPool) -> Self {
        Self {
            client_store: Arc::new(PostgresClientStore::new(pool.clone())),
            user_store: Arc::new(PostgresUserStore::new(pool.clone())),
            access_token_store: Arc::new(PostgresAccessTokenStore::new(pool.clone())),
            refresh_token_store: Arc::new(PostgresRefreshTokenStore::new(pool.clone())),
            pool,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ClientStore for PostgresBileMoStorage {
    async fn store_client(&self, client: &Client) -> Result<()> {
        self.client_store.store_client(client).await
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        self.client_store.get_client(client_id).await
    }

    async fn find_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        self.client_store.find_client_by_name(name).await
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        self.client_store.delete_client(client_id).await
    }
}

#[async_trait]
impl UserStore for PostgresBileMoStorage {
    async fn store_user(&self, user: &User) -> Result<()> {
        self.user_store.store_user(user).await
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        self.user_store.update_user(user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.user_store.get_user(user_id).await
    }

    async fn find_user_by_identity(
        &self,
        client_id: &str,
        username: &str,
        email: &str,
    ) -> Result<Option<User>> {
        self.user_store
            .find_user_by_identity(client_id, username, email)
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_store.find_user_by_email(email).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_store.find_user_by_username(username).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.user_store.delete_user(user_id).await
    }

    async fn list_client_users(&self, client_id: &str, query: &UserListQuery) -> Result<UserPage> {
        self.user_store.list_client_users(client_id, query).await
    }
}

#[async_trait]
impl AccessTokenStore for PostgresBileMoStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        self.access_token_store.store_token(token).await
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        self.access_token_store.get_token(token).await
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        self.access_token_store.revoke_token(token).await
    }

    async fn cleanup_expired_tokens(&self) -> Result<usize> {
        self.access_token_store.cleanup_expired_tokens().await
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresBileMoStorage {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        self.refresh_token_store.store_refresh_token(token).await
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        self.refresh_token_store.get_refresh_token(token).await
    }

    async fn find_refresh_token_for_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshToken>> {
        self.refresh_token_store
            .find_refresh_token_for_access_token(access_token)
            .await
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        self.refresh_token_store.consume_refresh_token(token).await
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<()> {
        self.refresh_token_store.revoke_refresh_token(token).await
    }

    async fn cleanup_expired_refresh_tokens(&self) -> Result<usize> {
        self.refresh_token_store
            .cleanup_expired_refresh_tokens()
            .await
    }
}
