//! Libris book catalog server
//!
//! A REST JSON API for a book catalog with stateless token authentication,
//! a single route policy table, and a borrow lifecycle (checkout, due date,
//! return, overdue).

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod security;
pub mod services;
pub mod validation;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub policy: Arc<security::Policy>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repository: repository::Repository,
        clock: Arc<dyn clock::Clock>,
    ) -> AppResult<Self> {
        let services = services::Services::new(repository, &config, clock)?;
        let policy = security::Policy::default_rules()
            .map_err(|e| AppError::Internal(format!("Invalid route policy: {}", e)))?;

        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(services),
            policy: Arc::new(policy),
        })
    }
}
