//! Client credential validation, per-client login and OAuth 2.0 token issuance.

pub mod accounts;
pub mod auth_server;
pub mod clients;
pub mod credentials;
pub mod issuer;
pub mod normalizer;
pub mod password;
pub mod registration;
pub mod types;
pub mod users;

// Re-export frequently used items from each module
pub use crate::storage::{
    inmemory::MemoryBileMoStorage,
    traits::{AccessTokenStore, BileMoStorage, ClientStore, RefreshTokenStore, UserStore},
};
pub use accounts::{UserAccessService, UserListParams, UserListResponse};
pub use auth_server::{ClientAuthentication, LocalTokenIssuer, TokenForm, extract_client_auth};
pub use clients::{ClientService, CreateClientRequest, CreateClientResponse, DeleteClientRequest};
pub use credentials::CredentialValidator;
pub use issuer::{RemoteTokenIssuer, TokenIssuer};
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use registration::{RegistrationRequest, RegistrationService};
pub use types::{
    AccessToken, Client, ClientKey, GrantType, PasswordGrantRequest, RefreshToken, Role,
    TokenRequest, TokenResponse, TokenType, User, UserView,
};
pub use users::{ResolvedUser, UserOrigin, UserResolver};
