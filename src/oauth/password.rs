//! Password hashing and verification for user accounts.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::errors::PasswordError;
use crate::oauth::types::User;

/// Hashes raw passwords and verifies them against stored users
pub trait PasswordHasher: Send + Sync {
    /// Produce a storable hash of `raw`
    fn hash(&self, raw: &str) -> Result<String, PasswordError>;

    /// Check `raw` against the user's stored hash
    fn verify(&self, user: &User, raw: &str) -> bool;
}

/// Argon2id password hasher
#[derive(Clone, Default)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Argon2id with explicit memory (KiB), iteration and parallelism costs
    pub fn with_params(
        memory_cost: u32,
        time_cost: u32,
        parallelism: u32,
    ) -> Result<Self, PasswordError> {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, raw: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify(&self, user: &User, raw: &str) -> bool {
        let parsed_hash = match PasswordHash::new(&user.password) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "stored password hash is unreadable");
                return false;
            }
        };
        self.argon2
            .verify_password(raw.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
