//! Borrow lifecycle service
//!
//! Dates come from the injected clock. Records leave this service with the
//! status derived for today, so an unreturned borrow past its due date reads
//! as OVERDUE.

use std::sync::Arc;

use crate::{
    clock::Clock,
    config::LoansConfig,
    error::AppResult,
    models::borrow::{Borrow, NewBorrow},
    repository::Repository,
    security::Principal,
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    config: LoansConfig,
    clock: Arc<dyn Clock>,
}

impl BorrowsService {
    pub fn new(repository: Repository, config: LoansConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            config,
            clock,
        }
    }

    /// Check a copy of `book_id` out to the caller
    pub async fn checkout(&self, principal: &Principal, book_id: i64) -> AppResult<Borrow> {
        let today = self.clock.today();
        let borrow = NewBorrow::checkout(principal.user_id, book_id, today, self.config.duration_days)?;
        let created = self.repository.borrows.checkout(&borrow).await?;
        tracing::info!(
            "User {} borrowed book {} until {}",
            principal.user_id,
            book_id,
            created.due_date
        );
        Ok(created.as_of(today))
    }

    /// Return a borrow; only its borrower or an admin may do so
    pub async fn return_borrow(&self, principal: &Principal, borrow_id: i64) -> AppResult<Borrow> {
        let current = self.repository.borrows.get_by_id(borrow_id).await?;
        principal.require_owner_or_admin(current.user_id)?;
        current.ensure_returnable()?;

        let today = self.clock.today();
        let returned = self.repository.borrows.return_borrow(borrow_id, today).await?;
        tracing::info!("Borrow {} returned by user {}", borrow_id, principal.user_id);
        Ok(returned)
    }

    pub async fn get(&self, principal: &Principal, borrow_id: i64) -> AppResult<Borrow> {
        let borrow = self.repository.borrows.get_by_id(borrow_id).await?;
        principal.require_owner_or_admin(borrow.user_id)?;
        Ok(borrow.as_of(self.clock.today()))
    }

    pub async fn list_mine(&self, principal: &Principal) -> AppResult<Vec<Borrow>> {
        let today = self.clock.today();
        let borrows = self.repository.borrows.list_for_user(principal.user_id).await?;
        Ok(borrows.into_iter().map(|b| b.as_of(today)).collect())
    }

    pub async fn list_all(&self) -> AppResult<Vec<Borrow>> {
        let today = self.clock.today();
        let borrows = self.repository.borrows.list_all().await?;
        Ok(borrows.into_iter().map(|b| b.as_of(today)).collect())
    }
}
