//! SQLite implementation for user storage

use super::{column, map_write_error, timestamp};
use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{Result, SortOrder, UserListQuery, UserPage, UserStore};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of user storage
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Create a new SQLite user store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to User
    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let role: String = column(row, "role")?;
        let role = role
            .parse::<Role>()
            .map_err(|r| StorageError::InvalidData(format!("Unknown role: {}", r)))?;
        let enabled: i64 = column(row, "enabled")?;

        Ok(User {
            id: column(row, "id")?,
            username: column(row, "username")?,
            email: column(row, "email")?,
            email_canonical: column(row, "email_canonical")?,
            password: column(row, "password")?,
            enabled: enabled != 0,
            role,
            client_id: column(row, "client_id")?,
            confirmation_token: column(row, "confirmation_token")?,
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
        })
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT * FROM users WHERE {} = ?", clause))
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn store_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, email_canonical, password, enabled, role,
                client_id, confirmation_token, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.email_canonical)
        .bind(&user.password)
        .bind(user.enabled as i64)
        .bind(user.role.as_str())
        .bind(&user.client_id)
        .bind(&user.confirmation_token)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "store user"))?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = ?, email = ?, email_canonical = ?, password = ?, enabled = ?,
                role = ?, client_id = ?, confirmation_token = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.email_canonical)
        .bind(&user.password)
        .bind(user.enabled as i64)
        .bind(user.role.as_str())
        .bind(&user.client_id)
        .bind(&user.confirmation_token)
        .bind(user.updated_at.to_rfc3339())
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
            "SELECT * FROM users WHERE client_id = ? AND username = ? AND email_canonical = ?",
        )
        .bind(client_id)
        .bind(username)
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Failed to find user: {}", e)))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("email_canonical", &email.to_lowercase()).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_where("username", username).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut tx =
            self.pool.begin().await.map_err(|e| {
                StorageError::DatabaseError(format!("Failed to begin transaction: {}", e))
            })?;

        sqlx::query("DELETE FROM access_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to delete tokens: {}", e)))?;

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                StorageError::DatabaseError(format!("Failed to delete refresh tokens: {}", e))
            })?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to delete user: {}", e)))?;

        tx.commit().await.map_err(|e| {
            StorageError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    async fn list_client_users(&self, client_id: &str, query: &UserListQuery) -> Result<UserPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE client_id = ?")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to count users: {}", e)))?;

        let order = match query.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let rows = sqlx::query(&format!(
            "SELECT * FROM users WHERE client_id = ? ORDER BY username {} LIMIT ? OFFSET ?",
            order
        ))
        .bind(client_id)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(format!("Failed to list users: {}", e)))?;

        let users = rows.iter().map(Self::row_to_user).collect::<Result<Vec<_>>>()?;
        Ok(UserPage {
            users,
            total: total as usize,
        })
    }
}
