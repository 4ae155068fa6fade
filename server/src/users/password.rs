//! Password Hashing
//!
//! Argon2id with PHC-formatted output. Hashing is CPU bound, so the async
//! hasher runs it on tokio's blocking pool.

use std::future::Future;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::Config;

/// Password hashing failures.
#[derive(Debug, Error)]
pub enum HashError {
    /// The Argon2 primitive rejected its input or parameters.
    #[error("argon2 failure: {0}")]
    Argon2(String),

    /// The stored hash is not a valid PHC string.
    #[error("malformed password hash")]
    MalformedHash,

    /// The hasher returned the plaintext unchanged.
    #[error("hasher returned the plaintext")]
    PlaintextEcho,

    /// The blocking task panicked or was cancelled.
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One-way password hashing primitive used before a write reaches storage.
pub trait PasswordHasher: Send + Sync {
    /// Hash `plaintext` into a storable string.
    fn hash(&self, plaintext: &str) -> impl Future<Output = Result<String, HashError>> + Send;

    /// Check `plaintext` against a hash produced by [`PasswordHasher::hash`].
    fn verify(
        &self,
        plaintext: &str,
        hash: &str,
    ) -> impl Future<Output = Result<bool, HashError>> + Send;
}

/// Hash a password with Argon2id default parameters.
pub fn hash_password(password: &str) -> Result<String, HashError> {
    hash_with(Params::default(), password)
}

/// Verify a password against a PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(hash).map_err(|_| HashError::MalformedHash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(HashError::Argon2(e.to_string())),
    }
}

fn hash_with(params: Params, password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::Argon2(e.to_string()))
}

/// Argon2id hasher with configurable cost.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Build a hasher from memory cost (KiB), iterations and lanes.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::Argon2(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &Config) -> Result<Self, HashError> {
        Self::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
        )
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    async fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let params = self.params.clone();
        let plaintext = Zeroizing::new(plaintext.to_owned());
        tokio::task::spawn_blocking(move || hash_with(params, &plaintext)).await?
    }

    async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, HashError> {
        let plaintext = Zeroizing::new(plaintext.to_owned());
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&plaintext, &hash)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret1").expect("Hashing should succeed");
        assert_ne!(hash, "secret1");
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password("secret1", &hash).unwrap());
        assert!(!verify_password("secret2", &hash).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash() {
        assert!(matches!(
            verify_password("secret1", "not-a-hash"),
            Err(HashError::MalformedHash)
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(Argon2Hasher::new(1024, 0, 1).is_err());
    }

    #[tokio::test]
    async fn test_async_hasher_salts_each_hash() {
        let hasher = fast_hasher();

        let first = hasher.hash("same_password").await.unwrap();
        let second = hasher.hash("same_password").await.unwrap();
        assert_ne!(first, second);

        assert!(hasher.verify("same_password", &first).await.unwrap());
        assert!(hasher.verify("same_password", &second).await.unwrap());
        assert!(!hasher.verify("other_password", &first).await.unwrap());
    }
}
