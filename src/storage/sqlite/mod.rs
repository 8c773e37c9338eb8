//! SQLite storage implementations
//!
//! This module provides SQLite-based implementations of all storage traits.
//! SQLite is suitable for single-instance deployments and development.

mod access_tokens;
mod clients;
mod refresh_tokens;
mod users;

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use std::sync::Arc;

pub use access_tokens::SqliteAccessTokenStore;
pub use clients::SqliteClientStore;
pub use refresh_tokens::SqliteRefreshTokenStore;
pub use users::SqliteUserStore;

/// Read a typed column from a row
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", name, e)))
}

/// Read an RFC 3339 timestamp column
fn timestamp(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>> {
    let value: String = column(row, name)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("Invalid {} timestamp: {}", name, e)))
}

/// Map an insert/update failure, reporting unique constraint violations as duplicates
fn map_write_error(error: sqlx::Error, operation: &str) -> StorageError {
    let is_unique_violation = error
        .as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false);
    if is_unique_violation {
        StorageError::Duplicate(format!("Failed to {}: {}", operation, error))
    } else {
        StorageError::DatabaseError(format!("Failed to {}: {}", operation, error))
    }
}

/// Comprehensive SQLite storage implementation
pub struct SqliteBileMoStorage {
    pool: SqlitePool,
    client_store: Arc<SqliteClientStore>,
    user_store: Arc<SqliteUserStore>,
    access_token_store: Arc<SqliteAccessTokenStore>,
    refresh_token_store: Arc<SqliteRefreshTokenStore>,
}

impl SqliteBileMoStorage {
    /// Create a new SQLite storage instance
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            client_store: Arc::new(SqliteClientStore::new(pool.clone())),
            user_store: Arc::new(SqliteUserStore::new(pool.clone())),
            access_token_store: Arc::new(SqliteAccessTokenStore::new(pool.clone())),
            refresh_token_store: Arc::new(SqliteRefreshTokenStore::new(pool.clone())),
            pool,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ClientStore for SqliteBileMoStorage {
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
impl UserStore for SqliteBileMoStorage {
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
impl AccessTokenStore for SqliteBileMoStorage {
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
impl RefreshTokenStore for SqliteBileMoStorage {
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
