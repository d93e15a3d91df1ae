//! Authentication and authorization
//!
//! The gate turns a bearer token into a [`RequestIdentity`] and never fails;
//! the policy then decides, from that identity alone, whether the request
//! may reach a handler.

pub mod gate;
pub mod identity;
pub mod password;
pub mod policy;
pub mod token;

pub use gate::AuthGate;
pub use identity::{Principal, RequestIdentity};
pub use password::PasswordHasher;
pub use policy::{Decision, Denial, Policy, Requirement};
pub use token::{TokenCodec, TokenError};

/// Auth settings with a cheap Argon2 work factor
#[cfg(test)]
pub(crate) fn test_auth_config() -> crate::config::AuthConfig {
    crate::config::AuthConfig {
        argon2_memory_kib: 256,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..crate::config::AuthConfig::default()
    }
}
