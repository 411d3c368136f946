//! Password hashing and verification using Argon2id
//!
//! Accounts store the salt and the PHC hash string side by side. The salt is
//! generated fresh on every (re)hash; the raw password is never kept.

use crate::{config::SecurityConfig, error::AccessError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Salt and hash produced for one password
#[derive(Debug, Clone)]
pub struct PasswordDigest {
    pub salt: String,
    pub hash: String,
}

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Hasher with the argon2 crate's default (OWASP) parameters
    pub fn new() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        }
    }

    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AccessError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AccessError::Crypto(format!("invalid argon2 params: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, AccessError> {
        Self::with_params(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
        )
    }

    /// Hash a password under a freshly generated salt
    pub fn hash(&self, password: &str) -> Result<PasswordDigest, AccessError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AccessError::Crypto(format!("failed to hash password: {e}"))
            })?
            .to_string();

        Ok(PasswordDigest {
            salt: salt.as_str().to_string(),
            hash,
        })
    }

    /// Verify a password against a stored salt + hash.
    ///
    /// Any malformed stored value counts as a mismatch. The digest comparison
    /// is constant-time.
    pub fn verify(&self, password: &str, salt: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Failed to parse password hash: {:?}", e);
                return false;
            }
        };

        if parsed.salt.map(|s| s.as_str()) != Some(salt) {
            tracing::debug!("Stored salt does not match password hash");
            return false;
        }

        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
