//! Password hashing (Argon2id, salted PHC strings)

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
};

/// Hash used to spend the same work on logins for unknown emails
const DUMMY_PASSWORD: &str = "libris-dummy-password";

#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Invalid Argon2 parameters: {}", e)))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash. Malformed hashes never match.
    ///
    /// The parameters embedded in the stored hash are used, so hashes made
    /// under an older work factor keep verifying.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Burn one verification; always false
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::test_auth_config as fast_config;

    #[test]
    fn test_hash_is_salted() {
        let hasher = PasswordHasher::new(&fast_config()).unwrap();
        let a = hasher.hash("Secret123").unwrap();
        let b = hasher.hash("Secret123").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let hasher = PasswordHasher::new(&fast_config()).unwrap();
        let hash = hasher.hash("Secret123").unwrap();
        assert!(hasher.verify("Secret123", &hash));
        assert!(!hasher.verify("secret123", &hash));
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        let hasher = PasswordHasher::new(&fast_config()).unwrap();
        assert!(!hasher.verify("Secret123", "not-a-phc-string"));
        assert!(!hasher.verify("Secret123", ""));
    }

    #[test]
    fn test_dummy_never_matches() {
        let hasher = PasswordHasher::new(&fast_config()).unwrap();
        assert!(!hasher.verify_dummy(DUMMY_PASSWORD));
    }
}
