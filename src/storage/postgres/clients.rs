//! PostgreSQL implementation for client storage

use super::{column, map_write_error};
use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{ClientStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of client storage
pub struct PostgresClientStore {
    pool: PgPool,
}

impl PostgresClientStore {
    /// Create a new PostgreSQL client store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to Client
    fn row_to_client(row: &PgRow) -> Result<Client> {
        let grant_types: Vec<String> = column(row, "allowed_grant_types")?;
        let allowed_grant_types = grant_types
            .iter()
            .map(|g| {
                g.parse::<GrantType>()
                    .map_err(|g| StorageError::InvalidData(format!("Unknown grant type: {}", g)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Client {
            id: column(row, "id")?,
            random_id: column(row, "random_id")?,
            secret: column(row, "secret")?,
            name: column(row, "name")?,
            redirect_uris: column(row, "redirect_uris")?,
            allowed_grant_types,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl ClientStore for PostgresClientStore {
    async fn store_client(&self, client: &Client) -> Result<()> {
        let grant_types: Vec<String> = client
            .allowed_grant_types
            .iter()
            .map(|g| g.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO clients (
                id, random_id, secret, name, redirect_uris, allowed_grant_types,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&client.id)
        .bind(&client.random_id)
        .bind(&client.secret)
        .bind(&client.name)
        .bind(&client.redirect_uris)
        .bind(&grant_types)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "store client"))?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn find_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM access_tokens WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM refresh_tokens WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query(
            "UPDATE users SET client_id = NULL, confirmation_token = NULL, updated_at = $1 WHERE client_id = $2",
        )
        .bind(Utc::now())
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
