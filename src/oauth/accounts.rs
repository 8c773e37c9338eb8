//! Per-client access to user accounts.
//!
//! Every operation is authorized by the caller's access token: a client only
//! sees its own users, and a user may be deleted by themself or by an admin of
//! the same client.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::UserAccessError;
use crate::oauth::types::{AccessToken, Client, ClientKey, Identifiable, Role, UserView};
use crate::storage::traits::{BileMoStorage, ClientStore, SortOrder, UserListQuery, UserStore};

const MAX_PAGE_SIZE: usize = 100;

/// Query string of `GET /users/{client_id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListParams {
    pub order: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl TryFrom<UserListParams> for UserListQuery {
    type Error = UserAccessError;

    fn try_from(params: UserListParams) -> Result<Self, Self::Error> {
        let defaults = UserListQuery::default();

        let order = match params.order.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("") | Some("asc") => SortOrder::Ascending,
            Some("desc") => SortOrder::Descending,
            Some(other) => {
                return Err(UserAccessError::InvalidQuery(format!("order={}", other)));
            }
        };

        let limit = match params.limit.as_deref().filter(|v| !v.is_empty()) {
            None => defaults.limit,
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|limit| (1..=MAX_PAGE_SIZE).contains(limit))
                .ok_or_else(|| UserAccessError::InvalidQuery(format!("limit={}", value)))?,
        };

        let offset = match params.offset.as_deref().filter(|v| !v.is_empty()) {
            None => defaults.offset,
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| UserAccessError::InvalidQuery(format!("offset={}", value)))?,
        };

        Ok(Self {
            order,
            limit,
            offset,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListMeta {
    pub total_items: usize,
    pub current_items: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Response of `GET /users/{client_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub data: Vec<UserView>,
    pub meta: UserListMeta,
}

pub struct UserAccessService {
    storage: Arc<dyn BileMoStorage>,
}

impl UserAccessService {
    pub fn new(storage: Arc<dyn BileMoStorage>) -> Self {
        Self { storage }
    }

    /// Fetch a user owned by the caller's client
    pub async fn get_user(
        &self,
        caller: &AccessToken,
        user_id: &str,
    ) -> Result<UserView, UserAccessError> {
        let user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| UserAccessError::UserNotFound(user_id.to_string()))?;

        if user.client_id.as_deref() != Some(caller.client_id.as_str()) {
            return Err(UserAccessError::ForbiddenView);
        }
        Ok(UserView::from(&user))
    }

    /// Delete a user, along with their tokens.
    ///
    /// Allowed for the user themself, or for an admin user of the same client.
    pub async fn delete_user(
        &self,
        caller: &AccessToken,
        user_id: &str,
    ) -> Result<(), UserAccessError> {
        let user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| UserAccessError::UserNotFound(user_id.to_string()))?;

        let caller_user_id = caller
            .user_id
            .as_deref()
            .ok_or(UserAccessError::ForbiddenDelete)?;

        let allowed = if caller_user_id == user.id() {
            true
        } else {
            match self.storage.get_user(caller_user_id).await? {
                Some(admin) => {
                    admin.role == Role::Admin
                        && admin.client_id.as_deref() == Some(caller.client_id.as_str())
                        && user.client_id == admin.client_id
                }
                None => false,
            }
        };

        if !allowed {
            tracing::warn!(caller = %caller_user_id, user_id = %user.id, "user deletion refused");
            return Err(UserAccessError::ForbiddenDelete);
        }

        self.storage.delete_user(user.id()).await?;
        tracing::info!(user_id = %user.id, deleted_by = %caller_user_id, "deleted user");
        Ok(())
    }

    /// List the users of the caller's client, ordered by username
    pub async fn list_users(
        &self,
        caller: &AccessToken,
        client_id: &str,
        query: UserListQuery,
    ) -> Result<UserListResponse, UserAccessError> {
        let client = self.find_client(client_id).await?;
        if client.id != caller.client_id {
            return Err(UserAccessError::ForbiddenClient);
        }

        let page = self.storage.list_client_users(&client.id, &query).await?;
        let data: Vec<UserView> = page.users.iter().map(UserView::from).collect();

        Ok(UserListResponse {
            meta: UserListMeta {
                total_items: page.total,
                current_items: data.len(),
                limit: query.limit,
                offset: query.offset,
            },
            data,
        })
    }

    /// Accepts either the public `{id}_{random_id}` form or the internal id
    async fn find_client(&self, client_id: &str) -> Result<Client, UserAccessError> {
        let client = match ClientKey::parse(client_id) {
            Some(_) => self.storage.find_client_by_public_id(client_id).await?,
            None => None,
        };
        let client = match client {
            Some(client) => Some(client),
            None => self.storage.get_client(client_id).await?,
        };
        client.ok_or_else(|| UserAccessError::ClientNotFound(client_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::{GrantType, TokenType, User};
    use crate::storage::MemoryBileMoStorage;
    use chrono::{Duration, Utc};

    fn client(id: &str) -> Client {
        Client {
            id: id.to_string(),
            random_id: format!("{}rnd", id),
            secret: "secret".to_string(),
            name: None,
            redirect_uris: vec![],
            allowed_grant_types: vec![GrantType::Password],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(id: &str, client_id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            username: id.to_string(),
            email: format!("{}@x.io", id),
            email_canonical: format!("{}@x.io", id),
            password: "hash".to_string(),
            enabled: true,
            role,
            client_id: Some(client_id.to_string()),
            confirmation_token: Some("secret-token".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn token(client_id: &str, user_id: &str) -> AccessToken {
        AccessToken {
            token: format!("at-{}", user_id),
            token_type: TokenType::Bearer,
            client_id: client_id.to_string(),
            user_id: Some(user_id.to_string()),
            scope: None,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    async fn setup() -> (UserAccessService, Arc<MemoryBileMoStorage>) {
        let storage = Arc::new(MemoryBileMoStorage::new());
        storage.store_client(&client("c1")).await.unwrap();
        storage.store_client(&client("c2")).await.unwrap();
        for (id, client_id, role) in [
            ("alice", "c1", Role::Admin),
            ("bob", "c1", Role::User),
            ("carol", "c1", Role::User),
            ("dave", "c2", Role::Admin),
        ] {
            storage.store_user(&user(id, client_id, role)).await.unwrap();
        }
        (UserAccessService::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_get_user_scoped_to_client() {
        let (service, _) = setup().await;

        let view = service.get_user(&token("c1", "bob"), "carol").await.unwrap();
        assert_eq!(view.username, "carol");

        assert!(matches!(
            service.get_user(&token("c2", "dave"), "carol").await,
            Err(UserAccessError::ForbiddenView)
        ));
        assert!(matches!(
            service.get_user(&token("c1", "bob"), "nobody").await,
            Err(UserAccessError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user_rules() {
        let (service, storage) = setup().await;

        assert!(matches!(
            service.delete_user(&token("c1", "bob"), "carol").await,
            Err(UserAccessError::ForbiddenDelete)
        ));
        assert!(matches!(
            service.delete_user(&token("c2", "dave"), "carol").await,
            Err(UserAccessError::ForbiddenDelete)
        ));

        service
            .delete_user(&token("c1", "alice"), "carol")
            .await
            .unwrap();
        assert!(storage.get_user("carol").await.unwrap().is_none());

        service.delete_user(&token("c1", "bob"), "bob").await.unwrap();
        assert!(storage.get_user("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_paged() {
        let (service, _) = setup().await;
        let caller = token("c1", "bob");

        let page = service
            .list_users(&caller, "c1_c1rnd", UserListQuery::default())
            .await
            .unwrap();
        let names: Vec<_> = page.data.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(page.meta.total_items, 3);
        assert_eq!(page.meta.current_items, 3);

        let query = UserListQuery::try_from(UserListParams {
            order: Some("desc".to_string()),
            limit: Some("2".to_string()),
            offset: Some("1".to_string()),
        })
        .unwrap();
        let page = service.list_users(&caller, "c1", query).await.unwrap();
        let names: Vec<_> = page.data.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
        assert_eq!(page.meta.total_items, 3);
        assert_eq!(page.meta.limit, 2);
        assert_eq!(page.meta.offset, 1);

        assert!(matches!(
            service
                .list_users(&caller, "c2", UserListQuery::default())
                .await,
            Err(UserAccessError::ForbiddenClient)
        ));
        assert!(matches!(
            service
                .list_users(&caller, "c9", UserListQuery::default())
                .await,
            Err(UserAccessError::ClientNotFound(_))
        ));
    }

    #[test]
    fn test_list_params_validation() {
        let query = UserListQuery::try_from(UserListParams::default()).unwrap();
        assert_eq!(query, UserListQuery::default());

        for params in [
            UserListParams {
                order: Some("sideways".to_string()),
                ..Default::default()
            },
            UserListParams {
                limit: Some("0".to_string()),
                ..Default::default()
            },
            UserListParams {
                limit: Some("abc".to_string()),
                ..Default::default()
            },
            UserListParams {
                offset: Some("-1".to_string()),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                UserListQuery::try_from(params),
                Err(UserAccessError::InvalidQuery(_))
            ));
        }
    }
}
