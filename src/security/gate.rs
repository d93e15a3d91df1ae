//! Authentication gate
//!
//! Classifies a request as anonymous or authenticated. Every failure
//! (bad token, expired token, unknown subject, store error) degrades to
//! anonymous; rejecting is left to the policy.

use std::sync::Arc;

use crate::repository::UserStore;

use super::{
    identity::{Principal, RequestIdentity},
    token::TokenCodec,
};

#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenCodec,
    users: Arc<dyn UserStore>,
}

impl AuthGate {
    pub fn new(tokens: TokenCodec, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// Identity for a request carrying `bearer` (the token after `Bearer `)
    pub async fn identify(&self, bearer: Option<&str>) -> RequestIdentity {
        let token = match bearer.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return RequestIdentity::Anonymous,
        };

        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                return RequestIdentity::Anonymous;
            }
        };

        match self.users.find_by_email(&claims.sub).await {
            Ok(Some(user)) => RequestIdentity::Authenticated(Principal {
                user_id: user.id,
                email: user.email,
                role: user.role,
            }),
            Ok(None) => {
                tracing::debug!("Token subject {} no longer exists", claims.sub);
                RequestIdentity::Anonymous
            }
            Err(e) => {
                tracing::error!("Credential lookup failed, treating request as anonymous: {}", e);
                RequestIdentity::Anonymous
            }
        }
    }
}
