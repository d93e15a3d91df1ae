//! Request-scoped caller identity

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::user::Role,
};

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Allow the owner of a record, or any admin
    pub fn require_owner_or_admin(&self, owner_id: i64) -> AppResult<()> {
        if self.user_id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Only the owner or an administrator may access this resource".to_string(),
            ))
        }
    }
}

/// Who is making the current request. Lives in the request extensions and
/// never outlives the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestIdentity {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

impl RequestIdentity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            RequestIdentity::Authenticated(principal) => Some(principal),
            RequestIdentity::Anonymous => None,
        }
    }
}
