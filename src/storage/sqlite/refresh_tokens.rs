//! SQLite implementation for refresh token storage

use super::{column, timestamp};
use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{RefreshTokenStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of refresh token storage
pub struct SqliteRefreshTokenStore {
    pool: SqlitePool,
}

impl SqliteRefreshTokenStore {
    /// Create a new SQLite refresh token store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to RefreshToken
    fn row_to_refresh_token(row: &SqliteRow) -> Result<RefreshToken> {
        Ok(RefreshToken {
            token: column(row, "token")?,
            access_token: column(row, "access_token")?,
            client_id: column(row, "client_id")?,
            user_id: column(row, "user_id")?,
            scope: column(row, "scope")?,
            created_at: timestamp(row, "created_at")?,
            expires_at: timestamp(row, "expires_at")?,
        })
    }
}

#[async_trait]
impl RefreshTokenStore for SqliteRefreshTokenStore {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                token, access_token, client_id, user_id, scope, created_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.token)
        .bind(&token.access_token)
        .bind(&token.client_id)
        .bind(&token.user_id)
        .bind(&token.scope)
        .bind(token.created_at.to_rfc3339())
        .bind(token.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            StorageError::DatabaseError(format!("Failed to store refresh token: {}", e))
        })?;

        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let row = sqlx::query("SELECT * FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get refresh token: {}", e))
            })?;

        row.as_ref().map(Self::row_to_refresh_token).transpose()
    }

    async fn find_refresh_token_for_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshToken>> {
        let row = sqlx::query("SELECT * FROM refresh_tokens WHERE access_token = ? LIMIT 1")
            .bind(access_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to find refresh token: {}", e))
            })?;

        row.as_ref().map(Self::row_to_refresh_token).transpose()
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let row = sqlx::query("DELETE FROM refresh_tokens WHERE token = ? RETURNING *")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to consume refresh token: {}", e))
            })?;

        let refresh_token = row.as_ref().map(Self::row_to_refresh_token).transpose()?;
        Ok(refresh_token.filter(|t| !t.is_expired(Utc::now())))
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to revoke refresh token: {}", e))
            })?;

        Ok(())
    }

    async fn cleanup_expired_refresh_tokens(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!(
                    "Failed to cleanup expired refresh tokens: {}",
                    e
                ))
            })?;

        Ok(result.rows_affected() as usize)
    }
}
