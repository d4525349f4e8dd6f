//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::PasswordConfig;
use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Argon2id RFC recommendations
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = params
        .to_argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Internal {
            operation: format!("hash password: {e}"),
        })?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Verification uses the parameters embedded in the hash itself.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
}

/// Hash on a blocking thread so argon2 doesn't stall the runtime.
pub async fn hash_password_blocking(password: String, params: Argon2Params) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_password(&password, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

/// Check a new password against the configured length bounds.
pub fn validate_password(password: &str, config: &PasswordConfig) -> Result<(), Error> {
    let length = password.chars().count();
    if length < config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", config.min_length),
        });
    }
    if length > config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", config.max_length),
        });
    }
    Ok(())
}
