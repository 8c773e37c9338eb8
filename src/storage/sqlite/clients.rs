//! SQLite implementation for client storage

use super::{column, map_write_error, timestamp};
use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{ClientStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of client storage
pub struct SqliteClientStore {
    pool: SqlitePool,
}

impl SqliteClientStore {
    /// Create a new SQLite client store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to Client
    fn row_to_client(row: &SqliteRow) -> Result<Client> {
        let redirect_uris_json: String = column(row, "redirect_uris")?;
        let redirect_uris: Vec<String> = serde_json::from_str(&redirect_uris_json)
            .map_err(|e| StorageError::InvalidData(format!("Invalid redirect_uris: {}", e)))?;

        let grant_types_json: String = column(row, "allowed_grant_types")?;
        let allowed_grant_types: Vec<GrantType> = serde_json::from_str(&grant_types_json)
            .map_err(|e| StorageError::InvalidData(format!("Invalid allowed_grant_types: {}", e)))?;

        Ok(Client {
            id: column(row, "id")?,
            random_id: column(row, "random_id")?,
            secret: column(row, "secret")?,
            name: column(row, "name")?,
            redirect_uris,
            allowed_grant_types,
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl ClientStore for SqliteClientStore {
    async fn store_client(&self, client: &Client) -> Result<()> {
        let redirect_uris_json = serde_json::to_string(&client.redirect_uris)
            .map_err(|e| StorageError::SerializationFailed(e.to_string()))?;
        let grant_types_json = serde_json::to_string(&client.allowed_grant_types)
            .map_err(|e| StorageError::SerializationFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO clients (
                id, random_id, secret, name, redirect_uris, allowed_grant_types,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&client.id)
        .bind(&client.random_id)
        .bind(&client.secret)
        .bind(&client.name)
        .bind(redirect_uris_json)
        .bind(grant_types_json)
        .bind(client.created_at.to_rfc3339())
        .bind(client.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "store client"))?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get client: {}", e)))?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn find_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to find client by name: {}", e))
            })?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut tx =
            self.pool.begin().await.map_err(|e| {
                StorageError::DatabaseError(format!("Failed to begin transaction: {}", e))
            })?;

        sqlx::query("DELETE FROM access_tokens WHERE client_id = ?")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to delete tokens: {}", e)))?;

        sqlx::query("DELETE FROM refresh_tokens WHERE client_id = ?")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to delete refresh tokens: {}", e))
            })?;

        sqlx::query(
            "UPDATE users SET client_id = NULL, confirmation_token = NULL, updated_at = ? WHERE client_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Failed to detach users: {}", e)))?;

        sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to delete client: {}", e)))?;

        tx.commit().await.map_err(|e| {
            StorageError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }
}
