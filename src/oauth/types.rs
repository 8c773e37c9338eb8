//! Core records and wire types for clients, users and OAuth tokens.
//!
//! Defines the plain data records persisted by the storage layer, the compound
//! client key, and the request/response shapes of the password grant.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// OAuth 2.0 Grant Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    Password,
    RefreshToken,
    ClientCredentials,
    AuthorizationCode,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::AuthorizationCode => "authorization_code",
        }
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "password" => Ok(GrantType::Password),
            "refresh_token" => Ok(GrantType::RefreshToken),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            other => Err(other.to_string()),
        }
    }
}

/// OAuth 2.0 Token Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    #[serde(alias = "Bearer")]
    Bearer,
}

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ROLE_USER" => Ok(Role::User),
            "ROLE_ADMIN" => Ok(Role::Admin),
            other => Err(other.to_string()),
        }
    }
}

/// Records addressed by an internal identifier
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Records that carry a shared secret
pub trait SecretBearing {
    fn secret(&self) -> &str;

    /// Constant-time comparison of `candidate` against the stored secret
    fn secret_matches(&self, candidate: &str) -> bool {
        self.secret().as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

/// Compound client key.
///
/// On the wire the key travels as a single public identifier `"{id}_{random_id}"`.
/// Client ids never contain an underscore, so the first underscore splits the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey {
    pub id: String,
    pub random_id: String,
}

impl ClientKey {
    pub fn new(id: impl Into<String>, random_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            random_id: random_id.into(),
        }
    }

    /// Parse a public client identifier
    pub fn parse(public_id: &str) -> Option<Self> {
        let (id, random_id) = public_id.split_once('_')?;
        if id.is_empty() || random_id.is_empty() {
            return None;
        }
        Some(Self::new(id, random_id))
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.random_id)
    }
}

/// API tenant allowed to register users and request tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Internal identifier
    pub id: String,
    /// Random half of the public identifier
    pub random_id: String,
    /// Client secret
    pub secret: String,
    /// Unique client name
    pub name: Option<String>,
    /// Redirect URIs
    pub redirect_uris: Vec<String>,
    /// Grant types allowed for this client
    pub allowed_grant_types: Vec<GrantType>,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn key(&self) -> ClientKey {
        ClientKey::new(self.id.clone(), self.random_id.clone())
    }

    /// Public identifier handed out as `client_id`
    pub fn public_id(&self) -> String {
        self.key().to_string()
    }

    pub fn allows_grant(&self, grant_type: &GrantType) -> bool {
        self.allowed_grant_types.contains(grant_type)
    }
}

impl Identifiable for Client {
    fn id(&self) -> &str {
        &self.id
    }
}

impl SecretBearing for Client {
    fn secret(&self) -> &str {
        &self.secret
    }
}

/// End-user account owned by at most one client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub email_canonical: String,
    /// Argon2 password hash
    pub password: String,
    pub enabled: bool,
    pub role: Role,
    /// Owning client id
    pub client_id: Option<String>,
    /// Latest access token issued through the login flow
    pub confirmation_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user account
impl Identifiable for User {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub enabled: bool,
    pub role: Role,
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            enabled: user.enabled,
            role: user.role,
            client_id: user.client_id.clone(),
            created_at: user.created_at,
        }
    }
}

/// OAuth Access Token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The access token
    pub token: String,
    /// Token type
    pub token_type: TokenType,
    /// Internal client id
    pub client_id: String,
    /// User ID (absent for client credentials)
    pub user_id: Option<String>,
    /// Granted scope
    pub scope: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// OAuth Refresh Token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    /// The refresh token
    pub token: String,
    /// Associated access token
    pub access_token: String,
    /// Internal client id
    pub client_id: String,
    /// User ID
    pub user_id: String,
    /// Granted scope
    pub scope: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Synthetic password-grant request forwarded to a token issuer
#[derive(Clone, Serialize)]
pub struct PasswordGrantRequest {
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: GrantType,
    pub username: String,
    pub password: String,
    pub scope: String,
}

impl fmt::Debug for PasswordGrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordGrantRequest")
            .field("client_id", &self.client_id)
            .field("grant_type", &self.grant_type)
            .field("username", &self.username)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Token endpoint request
#[derive(Clone, Deserialize)]
pub struct TokenRequest {
    /// Grant type
    pub grant_type: GrantType,
    /// Client ID
    pub client_id: Option<String>,
    /// Client secret
    pub client_secret: Option<String>,
    /// Resource owner username (password grant)
    pub username: Option<String>,
    /// Resource owner password (password grant)
    pub password: Option<String>,
    /// Refresh token (refresh_token grant)
    pub refresh_token: Option<String>,
    /// Requested scope
    pub scope: Option<String>,
}

impl From<PasswordGrantRequest> for TokenRequest {
    fn from(request: PasswordGrantRequest) -> Self {
        Self {
            grant_type: request.grant_type,
            client_id: Some(request.client_id),
            client_secret: Some(request.client_secret),
            username: Some(request.username),
            password: Some(request.password),
            refresh_token: None,
            scope: Some(request.scope),
        }
    }
}

/// Token Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Expires in seconds
    pub expires_in: u64,
    /// Token type
    pub token_type: TokenType,
    /// Granted scope
    pub scope: Option<String>,
    /// Refresh token
    pub refresh_token: Option<String>,
}

/// OAuth Error Response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code
    pub error: String,
    /// Error description
    pub error_description: Option<String>,
}

/// Generate a secure random token
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an internal client or user id
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate the random half of a public client identifier
pub fn generate_random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client() -> Client {
        Client {
            id: "2f1c0d6e-1111-4c1d-9a55-5d1f8c7a9b10".to_string(),
            random_id: "abc123".to_string(),
            secret: "s3cret".to_string(),
            name: Some("acme".to_string()),
            redirect_uris: vec!["https://acme.example/callback".to_string()],
            allowed_grant_types: vec![GrantType::Password],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_client_key_parse() {
        let key = ClientKey::parse("2f1c0d6e-1111_abc123").unwrap();
        assert_eq!(key.id, "2f1c0d6e-1111");
        assert_eq!(key.random_id, "abc123");
        assert_eq!(key.to_string(), "2f1c0d6e-1111_abc123");

        assert!(ClientKey::parse("no-separator").is_none());
        assert!(ClientKey::parse("_abc").is_none());
        assert!(ClientKey::parse("abc_").is_none());
    }

    #[test]
    fn test_public_id_round_trips_through_key() {
        let client = sample_client();
        let key = ClientKey::parse(&client.public_id()).unwrap();
        assert_eq!(key, client.key());
    }

    #[test]
    fn test_secret_matches() {
        let client = sample_client();
        assert!(client.secret_matches("s3cret"));
        assert!(!client.secret_matches("s3cre"));
        assert!(!client.secret_matches("s3cret "));
        assert!(!client.secret_matches(""));
    }

    #[test]
    fn test_generated_ids() {
        let random_id = generate_random_id();
        assert_eq!(random_id.len(), 40);
        assert!(random_id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(!generate_id().contains('_'));
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_role_and_grant_type_names() {
        assert_eq!("ROLE_ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("ROLE_ROOT".parse::<Role>().is_err());
        assert_eq!(
            serde_json::to_string(&Role::User).unwrap(),
            "\"ROLE_USER\""
        );
        assert_eq!("password".parse::<GrantType>().unwrap(), GrantType::Password);
        assert_eq!(GrantType::RefreshToken.as_str(), "refresh_token");
        assert_eq!(
            serde_json::to_string(&TokenType::Bearer).unwrap(),
            "\"bearer\""
        );
    }
}
