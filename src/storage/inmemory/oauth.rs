//! In-memory storage implementation
//!
//! This module provides in-memory implementations for client, user and token storage traits.

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory implementation for BileMo storage
#[derive(Default)]
pub struct MemoryBileMoStorage {
    clients: Mutex<HashMap<String, Client>>,
    users: Mutex<HashMap<String, User>>,
    access_tokens: Mutex<HashMap<String, AccessToken>>,
    refresh_tokens: Mutex<HashMap<String, RefreshToken>>,
}

impl MemoryBileMoStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StorageError::SerializationFailed(format!("Lock error: {}", e)))
}

fn check_user_unique(users: &HashMap<String, User>, user: &User) -> Result<()> {
    for existing in users.values().filter(|existing| existing.id != user.id) {
        if existing.username == user.username {
            return Err(StorageError::Duplicate(format!(
                "username {} already registered",
                user.username
            )));
        }
        if existing.email_canonical == user.email_canonical {
            return Err(StorageError::Duplicate(format!(
                "email {} already registered",
                user.email
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ClientStore for MemoryBileMoStorage {
    async fn store_client(&self, client: &Client) -> Result<()> {
        let mut clients = lock(&self.clients)?;
        if clients.contains_key(&client.id) {
            return Err(StorageError::Duplicate(format!("client {}", client.id)));
        }
        if let Some(name) = &client.name {
            if clients.values().any(|c| c.name.as_ref() == Some(name)) {
                return Err(StorageError::Duplicate(format!("client name {}", name)));
            }
        }
        clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let clients = lock(&self.clients)?;
        Ok(clients.get(client_id).cloned())
    }

    async fn find_client_by_name(&self, name: &str) -> Result<Option<Client>> {
        let clients = lock(&self.clients)?;
        Ok(clients
            .values()
            .find(|client| client.name.as_deref() == Some(name))
            .cloned())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        lock(&self.clients)?.remove(client_id);
        lock(&self.access_tokens)?.retain(|_, token| token.client_id != client_id);
        lock(&self.refresh_tokens)?.retain(|_, token| token.client_id != client_id);

        let now = Utc::now();
        for user in lock(&self.users)?
            .values_mut()
            .filter(|user| user.client_id.as_deref() == Some(client_id))
        {
            user.client_id = None;
            user.confirmation_token = None;
            user.updated_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryBileMoStorage {
    async fn store_user(&self, user: &User) -> Result<()> {
        let mut users = lock(&self.users)?;
        if users.contains_key(&user.id) {
            return Err(StorageError::Duplicate(format!("user {}", user.id)));
        }
        check_user_unique(&users, user)?;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut users = lock(&self.users)?;
        if !users.contains_key(&user.id) {
            return Err(StorageError::NotFound(format!("user {}", user.id)));
        }
        check_user_unique(&users, user)?;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let users = lock(&self.users)?;
        Ok(users.get(user_id).cloned())
    }

    async fn find_user_by_identity(
        &self,
        client_id: &str,
        username: &str,
        email: &str,
    ) -> Result<Option<User>> {
        let users = lock(&self.users)?;
        Ok(users
            .values()
            .find(|user| {
                user.client_id.as_deref() == Some(client_id)
                    && user.username == username
                    && user.email_canonical == email.to_lowercase()
            })
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let canonical = email.to_lowercase();
        let users = lock(&self.users)?;
        Ok(users
            .values()
            .find(|user| user.email_canonical == canonical)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = lock(&self.users)?;
        Ok(users.values().find(|user| user.username == username).cloned())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        lock(&self.users)?.remove(user_id);
        lock(&self.access_tokens)?.retain(|_, token| token.user_id.as_deref() != Some(user_id));
        lock(&self.refresh_tokens)?.retain(|_, token| token.user_id != user_id);
        Ok(())
    }

    async fn list_client_users(&self, client_id: &str, query: &UserListQuery) -> Result<UserPage> {
        let users = lock(&self.users)?;
        let mut owned: Vec<User> = users
            .values()
            .filter(|user| user.client_id.as_deref() == Some(client_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.username.cmp(&b.username));
        if query.order == SortOrder::Descending {
            owned.reverse();
        }

        let total = owned.len();
        let users = owned
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Ok(UserPage { users, total })
    }
}

#[async_trait]
impl AccessTokenStore for MemoryBileMoStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        let mut tokens = lock(&self.access_tokens)?;
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let tokens = lock(&self.access_tokens)?;
        Ok(tokens.get(token).cloned())
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        let mut tokens = lock(&self.access_tokens)?;
        tokens.remove(token);
        Ok(())
    }

    async fn cleanup_expired_tokens(&self) -> Result<usize> {
        let now = Utc::now();
        let mut tokens = lock(&self.access_tokens)?;
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired(now));
        Ok(before - tokens.len())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryBileMoStorage {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let mut tokens = lock(&self.refresh_tokens)?;
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let tokens = lock(&self.refresh_tokens)?;
        Ok(tokens.get(token).cloned())
    }

    async fn find_refresh_token_for_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshToken>> {
        let tokens = lock(&self.refresh_tokens)?;
        Ok(tokens
            .values()
            .find(|token| token.access_token == access_token)
            .cloned())
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let mut tokens = lock(&self.refresh_tokens)?;
        match tokens.remove(token) {
            Some(refresh_token) if refresh_token.is_expired(Utc::now()) => Ok(None),
            other => Ok(other),
        }
    }

    async fn cleanup_expired_refresh_tokens(&self) -> Result<usize> {
        let now = Utc::now();
        let mut tokens = lock(&self.refresh_tokens)?;
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired(now));
        Ok(before - tokens.len())
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<()> {
        let mut tokens = lock(&self.refresh_tokens)?;
        tokens.remove(token);
        Ok(())
    }
}
