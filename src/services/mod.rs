//! Business logic services

pub mod auth;
pub mod borrows;
pub mod catalog;

use std::sync::Arc;

use crate::{
    clock::Clock,
    config::AppConfig,
    error::AppResult,
    repository::Repository,
    security::{AuthGate, PasswordHasher, TokenCodec},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowsService,
    pub gate: AuthGate,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let hasher = PasswordHasher::new(&config.auth)?;
        let tokens = TokenCodec::new(&config.auth, clock.clone());

        Ok(Self {
            auth: auth::AuthService::new(repository.clone(), hasher, tokens.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), clock.clone()),
            borrows: borrows::BorrowsService::new(repository.clone(), config.loans.clone(), clock),
            gate: AuthGate::new(tokens, repository.users),
        })
    }
}
