//! PostgreSQL implementation for refresh token storage

use super::column;
use crate::errors::StorageError;
use crate::oauth::types::RefreshToken;
use crate::storage::traits::{RefreshTokenStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of refresh token storage
pub struct PostgresRefreshTokenStore {
    pool: PgPool,
}

impl PostgresRefreshTokenStore {
    /// Create a new PostgreSQL refresh token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to RefreshToken
    fn row_to_refresh_token(row: &PgRow) -> Result<RefreshToken> {
        Ok(RefreshToken {
            token: column(row, "token")?,
            access_token: column(row, "access_token")?,
            client_id: column(row, "client_id")?,
            user_id: column(row, "user_id")?,
            scope: column(row, "scope")?,
            created_at: column(row, "created_at")?,
            expires_at: column(row, "expires_at")?,
        })
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresRefreshTokenStore {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                token, access_token, client_id, user_id, scope, created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&token.token)
        .bind(&token.access_token)
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

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let row = sqlx::query("SELECT * FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_refresh_token).transpose()
    }

    async fn find_refresh_token_for_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshToken>> {
        let row = sqlx::query("SELECT * FROM refresh_tokens WHERE access_token = $1 LIMIT 1")
            .bind(access_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_refresh_token).transpose()
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let row = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1 RETURNING *")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let refresh_token = row.as_ref().map(Self::row_to_refresh_token).transpose()?;
        Ok(refresh_token.filter(|t| !t.is_expired(Utc::now())))
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn cleanup_expired_refresh_tokens(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
