//! User resolution for the login flow.
//!
//! Finds the account matching a login attempt and checks its password, moving it
//! to the authenticating client when it belonged elsewhere, or creates it.

use chrono::Utc;
use std::sync::Arc;

use crate::config::UsernameLookup;
use crate::errors::RegistrationError;
use crate::oauth::password::PasswordHasher;
use crate::oauth::types::{Client, Identifiable, Role, User, generate_id};
use crate::storage::traits::{BileMoStorage, UserStore};

/// How a resolved user was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOrigin {
    /// Matched on client, username and email
    ExactMatch,
    /// Matched on email alone
    EmailMatch,
    /// Matched on username alone
    UsernameMatch,
    /// No match; a new account was stored
    Created,
}

/// Result of [`UserResolver::resolve_or_create`]
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user: User,
    pub origin: UserOrigin,
}

impl ResolvedUser {
    pub fn is_existing(&self) -> bool {
        self.origin != UserOrigin::Created
    }
}

#[derive(Clone)]
pub struct UserResolver {
    storage: Arc<dyn BileMoStorage>,
    hasher: Arc<dyn PasswordHasher>,
    username_lookup: UsernameLookup,
    default_role: Role,
}

fn storage_failure(error: impl std::fmt::Debug) -> RegistrationError {
    tracing::error!(error = ?error, "user resolution failed");
    RegistrationError::RegistrationFailed
}

impl UserResolver {
    pub fn new(
        storage: Arc<dyn BileMoStorage>,
        hasher: Arc<dyn PasswordHasher>,
        username_lookup: UsernameLookup,
        default_role: Role,
    ) -> Self {
        Self {
            storage,
            hasher,
            username_lookup,
            default_role,
        }
    }

    /// Resolve the user for a login attempt against `client`.
    ///
    /// First match wins: exact identity, then email, then username. A user found
    /// under another client is reassigned to `client` once the password checks out.
    /// A failed password check leaves the stored user untouched.
    pub async fn resolve_or_create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        client: &Client,
    ) -> Result<ResolvedUser, RegistrationError> {
        if let Some(user) = self
            .storage
            .find_user_by_identity(client.id(), username, email)
            .await
            .map_err(storage_failure)?
        {
            self.check_password(&user, password)?;
            return Ok(ResolvedUser {
                user,
                origin: UserOrigin::ExactMatch,
            });
        }

        if let Some(user) = self
            .storage
            .find_user_by_email(email)
            .await
            .map_err(storage_failure)?
        {
            let user = self.claim(user, password, client).await?;
            return Ok(ResolvedUser {
                user,
                origin: UserOrigin::EmailMatch,
            });
        }

        let by_username = match self.username_lookup {
            UsernameLookup::Username => self.storage.find_user_by_username(username).await,
            UsernameLookup::Email => self.storage.find_user_by_email(username).await,
        }
        .map_err(storage_failure)?;
        if let Some(user) = by_username {
            let user = self.claim(user, password, client).await?;
            return Ok(ResolvedUser {
                user,
                origin: UserOrigin::UsernameMatch,
            });
        }

        let user = self.create(username, email, password, client).await?;
        Ok(ResolvedUser {
            user,
            origin: UserOrigin::Created,
        })
    }

    fn check_password(&self, user: &User, password: &str) -> Result<(), RegistrationError> {
        if self.hasher.verify(user, password) {
            Ok(())
        } else {
            tracing::info!(user_id = %user.id, "password check failed");
            Err(RegistrationError::InvalidCredentials)
        }
    }

    /// Verify the password, then move the user under `client`
    async fn claim(
        &self,
        mut user: User,
        password: &str,
        client: &Client,
    ) -> Result<User, RegistrationError> {
        self.check_password(&user, password)?;

        if user.client_id.as_deref() != Some(client.id()) {
            tracing::info!(
                user_id = %user.id,
                from = ?user.client_id,
                to = %client.id,
                "reassigning user to authenticating client"
            );
            user.client_id = Some(client.id().to_string());
            user.updated_at = Utc::now();
            self.storage
                .update_user(&user)
                .await
                .map_err(storage_failure)?;
        }
        Ok(user)
    }

    async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        client: &Client,
    ) -> Result<User, RegistrationError> {
        let now = Utc::now();
        let user = User {
            id: generate_id(),
            username: username.to_string(),
            email: email.to_string(),
            email_canonical: email.to_lowercase(),
            password: self.hasher.hash(password).map_err(storage_failure)?,
            enabled: true,
            role: self.default_role,
            client_id: Some(client.id().to_string()),
            confirmation_token: None,
            created_at: now,
            updated_at: now,
        };

        self.storage
            .store_user(&user)
            .await
            .map_err(storage_failure)?;
        tracing::info!(user_id = %user.id, client_id = %client.id, "created user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::password::Argon2PasswordHasher;
    use crate::oauth::types::GrantType;
    use crate::storage::MemoryBileMoStorage;

    fn client(id: &str) -> Client {
        Client {
            id: id.to_string(),
            random_id: "rnd".to_string(),
            secret: "secret".to_string(),
            name: None,
            redirect_uris: vec![],
            allowed_grant_types: vec![GrantType::Password],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn resolver(storage: Arc<MemoryBileMoStorage>, lookup: UsernameLookup) -> UserResolver {
        let hasher = Argon2PasswordHasher::with_params(1024, 1, 1).unwrap();
        UserResolver::new(storage, Arc::new(hasher), lookup, Role::User)
    }

    #[tokio::test]
    async fn test_creates_then_matches_exactly() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let resolver = resolver(storage.clone(), UsernameLookup::Username);
        let c1 = client("c1");

        let created = resolver
            .resolve_or_create("bob", "Bob@X.io", "pw1", &c1)
            .await
            .unwrap();
        assert_eq!(created.origin, UserOrigin::Created);
        assert!(!created.is_existing());
        assert_eq!(created.user.email_canonical, "bob@x.io");
        assert_eq!(created.user.client_id.as_deref(), Some("c1"));
        assert_eq!(created.user.role, Role::User);
        assert!(created.user.enabled);
        assert_ne!(created.user.password, "pw1");

        let again = resolver
            .resolve_or_create("bob", "Bob@X.io", "pw1", &c1)
            .await
            .unwrap();
        assert_eq!(again.origin, UserOrigin::ExactMatch);
        assert_eq!(again.user.id, created.user.id);
    }

    #[tokio::test]
    async fn test_email_match_moves_user_to_new_client() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let resolver = resolver(storage.clone(), UsernameLookup::Username);
        let created = resolver
            .resolve_or_create("bob", "bob@x.io", "pw1", &client("c1"))
            .await
            .unwrap();

        let moved = resolver
            .resolve_or_create("bob", "bob@x.io", "pw1", &client("c2"))
            .await
            .unwrap();
        assert_eq!(moved.origin, UserOrigin::EmailMatch);
        assert_eq!(moved.user.id, created.user.id);

        let stored = storage.get_user(&created.user.id).await.unwrap().unwrap();
        assert_eq!(stored.client_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_username_match() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let resolver = resolver(storage.clone(), UsernameLookup::Username);
        let created = resolver
            .resolve_or_create("bob", "bob@x.io", "pw1", &client("c1"))
            .await
            .unwrap();

        let matched = resolver
            .resolve_or_create("bob", "robert@x.io", "pw1", &client("c2"))
            .await
            .unwrap();
        assert_eq!(matched.origin, UserOrigin::UsernameMatch);
        assert_eq!(matched.user.id, created.user.id);
        assert_eq!(matched.user.email, "bob@x.io");
    }

    #[tokio::test]
    async fn test_email_lookup_mode_matches_username_against_email() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let resolver = resolver(storage.clone(), UsernameLookup::Email);
        let created = resolver
            .resolve_or_create("bob", "bob@x.io", "pw1", &client("c1"))
            .await
            .unwrap();

        let matched = resolver
            .resolve_or_create("bob@x.io", "other@x.io", "pw1", &client("c2"))
            .await
            .unwrap();
        assert_eq!(matched.origin, UserOrigin::UsernameMatch);
        assert_eq!(matched.user.id, created.user.id);
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_user_unchanged() {
        let storage = Arc::new(MemoryBileMoStorage::new());
        let resolver = resolver(storage.clone(), UsernameLookup::Username);
        let created = resolver
            .resolve_or_create("bob", "bob@x.io", "pw1", &client("c1"))
            .await
            .unwrap();

        let result = resolver
            .resolve_or_create("bob", "bob@x.io", "wrong", &client("c2"))
            .await;
        assert!(matches!(result, Err(RegistrationError::InvalidCredentials)));

        let exact = resolver
            .resolve_or_create("bob", "bob@x.io", "wrong", &client("c1"))
            .await;
        assert!(matches!(exact, Err(RegistrationError::InvalidCredentials)));

        let stored = storage.get_user(&created.user.id).await.unwrap().unwrap();
        assert_eq!(stored.client_id.as_deref(), Some("c1"));
        assert_eq!(stored.updated_at, created.user.updated_at);
        assert_eq!(stored.password, created.user.password);
    }
}
