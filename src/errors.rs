//! Standardized error types following the `error-bilemo-<domain>-<number>` format.

use http::StatusCode;
use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-bilemo-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-bilemo-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-bilemo-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-bilemo-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-bilemo-config-5 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when a role name is not recognized
    #[error("error-bilemo-config-6 Unknown role '{0}': expected ROLE_USER or ROLE_ADMIN")]
    UnknownRole(String),

    /// Error when the username lookup mode is not recognized
    #[error("error-bilemo-config-7 Unknown username lookup '{0}': expected username or email")]
    UnknownUsernameLookup(String),

    /// Error when the token issuer URL cannot be parsed
    #[error("error-bilemo-config-8 Invalid token issuer URL '{0}': {1}")]
    InvalidTokenIssuerUrl(String, url::ParseError),
}

/// OAuth-related errors raised by token issuers
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Error when OAuth token exchange fails
    #[error("error-bilemo-oauth-1 Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Invalid client credentials
    #[error("error-bilemo-oauth-2 Invalid client credentials: {0}")]
    InvalidClient(String),

    /// Invalid resource owner credentials or refresh token
    #[error("error-bilemo-oauth-3 Invalid grant: {0}")]
    InvalidGrant(String),

    /// Unsupported grant type
    #[error("error-bilemo-oauth-4 Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Invalid request
    #[error("error-bilemo-oauth-5 Invalid request: {0}")]
    InvalidRequest(String),

    /// Unauthorized client
    #[error("error-bilemo-oauth-6 Unauthorized client: {0}")]
    UnauthorizedClient(String),

    /// Server error
    #[error("error-bilemo-oauth-7 Server error: {0}")]
    ServerError(String),
}

impl OAuthError {
    /// OAuth 2.0 error code and HTTP status for the token endpoint
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            OAuthError::InvalidClient(_) => (StatusCode::UNAUTHORIZED, "invalid_client"),
            OAuthError::InvalidGrant(_) => (StatusCode::BAD_REQUEST, "invalid_grant"),
            OAuthError::UnsupportedGrantType(_) => {
                (StatusCode::BAD_REQUEST, "unsupported_grant_type")
            }
            OAuthError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            OAuthError::UnauthorizedClient(_) => (StatusCode::BAD_REQUEST, "unauthorized_client"),
            OAuthError::TokenExchangeFailed(_) | OAuthError::ServerError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }
        }
    }
}

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Error when the hasher rejects its input or parameters
    #[error("error-bilemo-password-1 Password hashing failed: {0}")]
    HashingFailed(String),
}

/// Errors surfaced by the per-client login and registration flow
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A required payload field is missing or empty
    #[error("error-bilemo-registration-1 {0} missing")]
    MissingField(&'static str),

    /// Neither client id and secret nor client name were supplied
    #[error("error-bilemo-registration-2 client_id, client_secret or clientName missing")]
    MissingClientIdentification,

    /// No client matches the supplied identification
    #[error("error-bilemo-registration-3 Client not found: {0}")]
    ClientNotFound(String),

    /// The supplied client secret does not belong to the client
    #[error("error-bilemo-registration-4 Client identification incorrect")]
    ClientMismatch,

    /// Wrong password for an existing identity
    #[error("error-bilemo-registration-5 Invalid credentials")]
    InvalidCredentials,

    /// Resolver, persistence or issuer failure
    #[error("error-bilemo-registration-6 User already exists or password is wrong")]
    RegistrationFailed,

    /// Stored access token is past its expiry
    #[error("error-bilemo-registration-7 Access token expired")]
    TokenExpired,
}

impl RegistrationError {
    /// HTTP status and short error code for the login endpoint
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            RegistrationError::MissingField(_) => (StatusCode::BAD_REQUEST, "missing_field"),
            RegistrationError::MissingClientIdentification => {
                (StatusCode::BAD_REQUEST, "missing_client_identification")
            }
            RegistrationError::ClientNotFound(_) => (StatusCode::NOT_FOUND, "client_not_found"),
            RegistrationError::ClientMismatch => (StatusCode::UNAUTHORIZED, "client_mismatch"),
            RegistrationError::InvalidCredentials
            | RegistrationError::RegistrationFailed
            | RegistrationError::TokenExpired => (StatusCode::BAD_REQUEST, "registration_failed"),
        }
    }
}

/// Client provisioning and removal errors
#[derive(Debug, Error)]
pub enum ClientManagementError {
    /// Invalid client metadata
    #[error("error-bilemo-client-1 Invalid client metadata: {0}")]
    InvalidClientMetadata(String),

    /// Invalid redirect URI
    #[error("error-bilemo-client-2 Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Client not found
    #[error("error-bilemo-client-3 Client not found: {0}")]
    ClientNotFound(String),

    /// Compound key or secret does not match the stored client
    #[error("error-bilemo-client-4 Client ownership check failed")]
    OwnershipMismatch,

    /// Client name is already taken
    #[error("error-bilemo-client-5 Client name already registered: {0}")]
    NameTaken(String),

    /// Storage failure while managing clients
    #[error("error-bilemo-client-6 Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl ClientManagementError {
    /// HTTP status and short error code for the client endpoints
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ClientManagementError::InvalidClientMetadata(_) => {
                (StatusCode::BAD_REQUEST, "invalid_client_metadata")
            }
            ClientManagementError::InvalidRedirectUri(_) => {
                (StatusCode::BAD_REQUEST, "invalid_redirect_uri")
            }
            ClientManagementError::ClientNotFound(_) => (StatusCode::NOT_FOUND, "client_not_found"),
            ClientManagementError::OwnershipMismatch => (StatusCode::FORBIDDEN, "access_denied"),
            ClientManagementError::NameTaken(_) => (StatusCode::CONFLICT, "name_taken"),
            ClientManagementError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error")
            }
        }
    }
}

/// Errors raised when reading or deleting user accounts
#[derive(Debug, Error)]
pub enum UserAccessError {
    /// Requested user does not exist
    #[error("error-bilemo-user-1 User not found: {0}")]
    UserNotFound(String),

    /// Requested client does not exist
    #[error("error-bilemo-user-2 Client not found: {0}")]
    ClientNotFound(String),

    /// Token's client does not own the user
    #[error("error-bilemo-user-3 You are not allowed to see this User")]
    ForbiddenView,

    /// Token's user may not delete the account
    #[error("error-bilemo-user-4 You can only delete your own account")]
    ForbiddenDelete,

    /// Token's client is not the requested client
    #[error("error-bilemo-user-5 You don't have the credentials to access to this client")]
    ForbiddenClient,

    /// Invalid list parameters
    #[error("error-bilemo-user-6 Invalid query parameter: {0}")]
    InvalidQuery(String),

    /// Storage failure while accessing users
    #[error("error-bilemo-user-7 Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl UserAccessError {
    /// HTTP status and short error code for the user endpoints
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            UserAccessError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            UserAccessError::ClientNotFound(_) => (StatusCode::NOT_FOUND, "client_not_found"),
            UserAccessError::ForbiddenView
            | UserAccessError::ForbiddenDelete
            | UserAccessError::ForbiddenClient => (StatusCode::FORBIDDEN, "access_denied"),
            UserAccessError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            UserAccessError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        }
    }
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-bilemo-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when query execution fails
    #[error("error-bilemo-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when data serialization fails
    #[error("error-bilemo-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when database operation fails
    #[error("error-bilemo-storage-4 Database error: {0}")]
    DatabaseError(String),

    /// Error when data validation fails
    #[error("error-bilemo-storage-5 Invalid data: {0}")]
    InvalidData(String),

    /// Error when a uniqueness constraint is violated
    #[error("error-bilemo-storage-6 Duplicate record: {0}")]
    Duplicate(String),

    /// Error when requested resource is not found
    #[error("error-bilemo-storage-7 Not found: {0}")]
    NotFound(String),
}
