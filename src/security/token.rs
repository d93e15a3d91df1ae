//! Signed, expiring identity tokens (HS256 JWT)
//!
//! Verification needs nothing but the server secret and the clock: no
//! session table is consulted.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::{
    clock::Clock,
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{User, UserClaims},
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match its claims")]
    Tampered,
    #[error("token has expired")]
    Expired,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    leeway_seconds: i64,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked against the injected clock in `verify`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            ttl: Duration::hours(config.jwt_expiration_hours as i64),
            leeway_seconds: config.token_leeway_seconds as i64,
            clock,
        }
    }

    /// Issue a token for `user`, valid for the configured lifetime
    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = self.clock.now();
        let claims = UserClaims {
            sub: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Check signature, shape and expiry of `token`
    pub fn verify(&self, token: &str) -> Result<UserClaims, TokenError> {
        let claims = decode::<UserClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::Tampered,
                _ => TokenError::Malformed,
            })?
            .claims;

        if self.clock.now().timestamp() > claims.exp.saturating_add(self.leeway_seconds) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
