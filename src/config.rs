//! Environment-based configuration types for BileMo server runtime settings.

use anyhow::Result;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;
use crate::oauth::types::Role;

/// HTTP server port configuration
#[derive(Clone, Debug)]
pub struct HttpPort(u16);

/// HTTP client timeout configuration
#[derive(Clone, Debug)]
pub struct HttpClientTimeout(Duration);

/// Access token lifetime
#[derive(Clone, Debug)]
pub struct AccessTokenExpiration(chrono::Duration);

/// Refresh token lifetime
#[derive(Clone, Debug)]
pub struct RefreshTokenExpiration(chrono::Duration);

/// Scope requested by the login flow
#[derive(Clone, Debug)]
pub struct LoginScope(String);

/// Role assigned to newly created users
#[derive(Clone, Debug)]
pub struct DefaultUserRole(Role);

/// External token endpoint used instead of the in-process issuer
#[derive(Clone, Debug)]
pub struct TokenIssuerUrl(Url);

/// Column matched against the supplied username when resolving users
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UsernameLookup {
    /// Match against the username column
    #[default]
    Username,
    /// Match against the email column
    Email,
}

/// Main application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub enable_client_api: bool,
    pub access_token_expiration: AccessTokenExpiration,
    pub refresh_token_expiration: RefreshTokenExpiration,
    pub login_scope: LoginScope,
    pub default_user_role: DefaultUserRole,
    pub username_lookup: UsernameLookup,
    pub token_issuer_url: Option<TokenIssuerUrl>,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let default_user_agent = format!("bilemo/{}", version()?);
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let user_agent = default_env("USER_AGENT", &default_user_agent);
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = optional_env("DATABASE_URL");
        let enable_client_api = parse_bool(&default_env("ENABLE_CLIENT_API", "false"))?;
        let access_token_expiration: AccessTokenExpiration =
            default_env("ACCESS_TOKEN_EXPIRATION", "1h").try_into()?;
        let refresh_token_expiration: RefreshTokenExpiration =
            default_env("REFRESH_TOKEN_EXPIRATION", "14d").try_into()?;
        let login_scope: LoginScope = default_env("LOGIN_SCOPE", "ROLE_USER").try_into()?;
        let default_user_role: DefaultUserRole =
            default_env("DEFAULT_USER_ROLE", "ROLE_USER").try_into()?;
        let username_lookup: UsernameLookup =
            default_env("USERNAME_LOOKUP", "username").try_into()?;
        let token_issuer_url = optional_env("TOKEN_ISSUER_URL")
            .filter(|value| !value.is_empty())
            .map(TokenIssuerUrl::try_from)
            .transpose()?;

        Ok(Self {
            version: version()?,
            http_port,
            user_agent,
            http_client_timeout,
            storage_backend,
            database_url,
            enable_client_api,
            access_token_expiration,
            refresh_token_expiration,
            login_scope,
            default_user_role,
            username_lookup,
            token_issuer_url,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let version = version().unwrap_or_else(|_| "unknown".to_string());
        Self {
            user_agent: format!("bilemo/{}", version),
            version,
            http_port: HttpPort(8080),
            http_client_timeout: HttpClientTimeout(Duration::from_secs(10)),
            storage_backend: "memory".to_string(),
            database_url: None,
            enable_client_api: false,
            access_token_expiration: AccessTokenExpiration(chrono::Duration::hours(1)),
            refresh_token_expiration: RefreshTokenExpiration(chrono::Duration::days(14)),
            login_scope: LoginScope("ROLE_USER".to_string()),
            default_user_role: DefaultUserRole(Role::User),
            username_lookup: UsernameLookup::Username,
            token_issuer_url: None,
        }
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::BoolParsingFailed(value.to_string())),
    }
}

fn parse_duration(value: String) -> Result<chrono::Duration, ConfigError> {
    let duration = duration_str::parse(&value)
        .map_err(|e| ConfigError::DurationParsingFailed(value.clone(), e.to_string()))?;
    chrono::Duration::from_std(duration)
        .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
}

impl TryFrom<String> for HttpPort {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(ConfigError::PortParsingFailed)
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for AccessTokenExpiration {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_duration(value).map(Self)
    }
}

impl From<chrono::Duration> for AccessTokenExpiration {
    fn from(value: chrono::Duration) -> Self {
        Self(value)
    }
}

impl AsRef<chrono::Duration> for AccessTokenExpiration {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for RefreshTokenExpiration {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_duration(value).map(Self)
    }
}

impl From<chrono::Duration> for RefreshTokenExpiration {
    fn from(value: chrono::Duration) -> Self {
        Self(value)
    }
}

impl AsRef<chrono::Duration> for RefreshTokenExpiration {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for LoginScope {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Ok(Self("ROLE_USER".to_string()));
        }
        Ok(Self(value.trim().to_string()))
    }
}

impl AsRef<String> for LoginScope {
    fn as_ref(&self) -> &String {
        &self.0
    }
}

impl TryFrom<String> for DefaultUserRole {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse::<Role>()
            .map(Self)
            .map_err(ConfigError::UnknownRole)
    }
}

impl AsRef<Role> for DefaultUserRole {
    fn as_ref(&self) -> &Role {
        &self.0
    }
}

impl TryFrom<String> for UsernameLookup {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "username" | "" => Ok(UsernameLookup::Username),
            "email" => Ok(UsernameLookup::Email),
            _ => Err(ConfigError::UnknownUsernameLookup(value)),
        }
    }
}

impl TryFrom<String> for TokenIssuerUrl {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Url::parse(&value)
            .map(Self)
            .map_err(|e| ConfigError::InvalidTokenIssuerUrl(value, e))
    }
}

impl AsRef<Url> for TokenIssuerUrl {
    fn as_ref(&self) -> &Url {
        &self.0
    }
}
