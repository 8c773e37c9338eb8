//! SQLite implementation for access token storage

use super::{column, timestamp};
use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{AccessTokenStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of access token storage
pub struct SqliteAccessTokenStore {
    pool: SqlitePool,
}

impl SqliteAccessTokenStore {
    /// Create a new SQLite access token store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to AccessToken
    fn row_to_access_token(row: &SqliteRow) -> Result<AccessToken> {
        let token_type: String = column(row, "token_type")?;
        if token_type != "bearer" {
            return Err(StorageError::InvalidData(format!(
                "Unknown token type: {}",
                token_type
            )));
        }

        Ok(AccessToken {
            token: column(row, "token")?,
            token_type: TokenType::Bearer,
            client_id: column(row, "client_id")?,
            user_id: column(row, "user_id")?,
            scope: column(row, "scope")?,
            created_at: timestamp(row, "created_at")?,
            expires_at: timestamp(row, "expires_at")?,
        })
    }
}

#[async_trait]
impl AccessTokenStore for SqliteAccessTokenStore {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (
                token, token_type, client_id, user_id, scope, created_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.token)
        .bind("bearer")
        .bind(&token.client_id)
        .bind(&token.user_id)
        .bind(&token.scope)
        .bind(token.created_at.to_rfc3339())
        .bind(token.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Failed to store token: {}", e)))?;

        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get token: {}", e)))?;

        row.as_ref().map(Self::row_to_access_token).transpose()
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to revoke token: {}", e)))?;

        Ok(())
    }

    async fn cleanup_expired_tokens(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= ?")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to cleanup expired tokens: {}", e))
            })?;

        Ok(result.rows_affected() as usize)
    }
}
