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
    /// Cheap parameters for tests
    pub const FAST: Self = Self {
        memory_kib: 128,
        iterations: 1,
        parallelism: 1,
    };

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
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

pub fn hash_string_with_params(input: &str, params: Option<Argon2Params>) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.unwrap_or_default().to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

pub fn hash_string(input: &str) -> Result<String, Error> {
    hash_string_with_params(input, None)
}

/// Verify a string against a hash. Parameters are read from the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Hash on a blocking thread so request workers stay free
pub async fn hash_password(password: String) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

/// Enforce the configured length bounds
pub fn validate_password(password: &str, rules: &PasswordConfig) -> Result<(), Error> {
    let length = password.chars().count();
    if length < rules.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", rules.min_length),
        });
    }
    if length > rules.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at most {} characters", rules.max_length),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hashing() {
        let hash = hash_string_with_params("test_password_123", Some(Argon2Params::FAST)).unwrap();
        assert!(verify_string("test_password_123", &hash).unwrap());
        assert!(!verify_string("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hash1 = hash_string_with_params("same_password", Some(Argon2Params::FAST)).unwrap();
        let hash2 = hash_string_with_params("same_password", Some(Argon2Params::FAST)).unwrap();

        // Salted
        assert_ne!(hash1, hash2);
        assert!(verify_string("same_password", &hash1).unwrap());
        assert!(verify_string("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_string("anything", "not-a-phc-string").is_err());
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password("admin123".to_string()).await.unwrap();
        assert!(verify_password("admin123".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("admin124".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_validate_password() {
        let rules = PasswordConfig::default();
        assert!(validate_password("secret", &rules).is_ok());
        assert!(validate_password("short", &rules).is_err());
        assert!(validate_password(&"x".repeat(65), &rules).is_err());
    }
}
