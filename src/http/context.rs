//! Application state shared by request handlers.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Config;
use crate::oauth::{
    ClientService, LocalTokenIssuer, RegistrationService, UserAccessService,
};
use crate::storage::traits::BileMoStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Storage for clients, users and tokens
    pub storage: Arc<dyn BileMoStorage>,
    /// Per-client login flow
    pub registration_service: Arc<RegistrationService>,
    /// Token server behind `/oauth/v2/token`
    pub token_server: Arc<LocalTokenIssuer>,
    pub client_service: Arc<ClientService>,
    pub user_access_service: Arc<UserAccessService>,
}

impl FromRef<AppState> for Arc<dyn BileMoStorage> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.storage.clone()
    }
}
