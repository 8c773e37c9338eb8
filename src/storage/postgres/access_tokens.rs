//! PostgreSQL implementation for access token storage

use super::column;
use crate::errors::StorageError;
use crate::oauth::types::{AccessToken, TokenType};
use crate::storage::traits::{AccessTokenStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of access token storage
pub struct PostgresAccessTokenStore {
    pool: PgPool,
}

impl PostgresAccessTokenStore {
    /// Create a new PostgreSQL access token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to AccessToken
    fn row_to_access_token(row: &PgRow) -> Result<AccessToken> {
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
            created_at: column(row, "created_at")?,
            expires_at: column(row, "expires_at")?,
        })
    }
}

#[async_trait]
impl AccessTokenStore for PostgresAccessTokenStore {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (
                token, token_type, client_id, user_id, scope, created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&token.token)
        .bind("bearer")
        .bind(&token.client_id)
        .bind(&token.user_id)
        .bind(&token.scope)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_token).transpose()
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn cleanup_expired_tokens(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
