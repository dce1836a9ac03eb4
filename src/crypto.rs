//! Password hashing and digests.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params, Version};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::Argon2 as ArgonConfig;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Cryptographic manager.
pub struct Crypto {
    pub pwd: PasswordManager,
    pub hasher: Hasher,
}

impl Crypto {
    /// Create a new [`Crypto`].
    pub fn new(config: Option<ArgonConfig>, pepper: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self {
            pwd: PasswordManager::new(config)?,
            hasher: Hasher::new(pepper),
        })
    }
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash password using Argon2id with a random salt.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC string.
    ///
    /// A malformed PHC string is reported as a mismatch.
    pub fn verify_password(&self, password: impl AsRef<[u8]>, phc_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(phc_hash) else {
            return false;
        };

        self.argon2()
            .verify_password(password.as_ref(), &parsed)
            .is_ok()
    }
}

/// Peppered SHA-256.
pub struct Hasher(Zeroizing<Vec<u8>>);

impl Hasher {
    /// Create a new [`Hasher`].
    pub fn new(pepper: impl AsRef<[u8]>) -> Self {
        Self(Zeroizing::new(pepper.as_ref().to_vec()))
    }

    /// Digest data into hex-encoded SHA256.
    pub fn digest(&self, data: impl AsRef<[u8]>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_slice());
        hasher.update(&data);

        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Option<ArgonConfig> {
        Some(ArgonConfig {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        })
    }

    #[test]
    fn test_sha2() {
        let hasher = Hasher::new([0x42; 16]);

        let digest = hasher.digest(b"super_secret_data");
        assert_eq!(digest, hasher.digest(b"super_secret_data"));
        assert_ne!(digest, Hasher::new([0x43; 16]).digest(b"super_secret_data"));
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_password_roundtrip() {
        let pwd = PasswordManager::new(cheap()).unwrap();
        let phc = pwd.hash_password("correct horse").unwrap();

        assert!(phc.starts_with("$argon2id$"));
        assert!(pwd.verify_password("correct horse", &phc));
        assert!(!pwd.verify_password("battery staple", &phc));
    }

    #[test]
    fn test_same_password_different_salt() {
        let pwd = PasswordManager::new(cheap()).unwrap();
        assert_ne!(
            pwd.hash_password("P4ssword").unwrap(),
            pwd.hash_password("P4ssword").unwrap()
        );
    }

    #[test]
    fn test_malformed_phc() {
        let pwd = PasswordManager::new(cheap()).unwrap();
        assert!(!pwd.verify_password("P4ssword", "not-a-phc-string"));
    }
}
