//! PostgreSQL implementation for user storage

use super::{column, map_write_error};
use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{Result, SortOrder, UserListQuery, UserPage, UserStore};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of user storage
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Create a new PostgreSQL user store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to User
    fn row_to_user(row: &PgRow) -> Result<User> {
        let role: String = column(row, "role")?;
        let role = role
            .parse::<Role>()
            .map_err(|r| StorageError::InvalidData(format!("Unknown role: {}", r)))?;

        Ok(User {
            id: column(row, "id")?,
            username: column(row, "username")?,
            email: column(row, "email")?,
            email_canonical: column(row, "email_canonical")?,
            password: column(row, "password")?,
            enabled: column(row, "enabled")?,
            role,
            client_id: column(row, "client_id")?,
            confirmation_token: column(row, "confirmation_token")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT * FROM users WHERE {} = $1", clause))
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn store_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, email_canonical, password, enabled, role,
                client_id, confirmation_token, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.email_canonical)
        .bind(&user.password)
        .bind(user.enabled)
        .bind(user.role.as_str())
        .bind(&user.client_id)
        .bind(&user.confirmation_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "store user"))?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = $1, email = $2, email_canonical = $3, password = $4, enabled = $5,
                role = $6, client_id = $7, confirmation_token = $8, updated_at = $9
            WHERE id = $10
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.email_canonical)
        .bind(&user.password)
        .bind(user.enabled)
        .bind(user.role.as_str())
        .bind(&user.client_id)
        .bind(&user.confirmation_token)
        .bind(user.updated_at)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "update user"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.fetch_one_where("id", user_id).await
    }

    async fn find_user_by_identity(
        &self,
        client_id: &str,
        username: &str,
        email: &str,
    ) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT * FROM users WHERE client_id = $1 AND username = $2 AND email_canonical = $3",
        )
        .bind(client_id)
        .bind(username)
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("email_canonical", &email.to_lowercase()).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_where("username", username).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn list_client_users(&self, client_id: &str, query: &UserListQuery) -> Result<UserPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE client_id = $1")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let order = match query.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let rows = sqlx::query(&format!(
            "SELECT * FROM users WHERE client_id = $1 ORDER BY username {} LIMIT $2 OFFSET $3",
            order
        ))
        .bind(client_id)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let users = rows.iter().map(Self::row_to_user).collect::<Result<Vec<_>>>()?;
        Ok(UserPage {
            users,
            total: total as usize,
        })
    }
}
