//! Borrows repository for database operations
//!
//! Checkout and return each run in one transaction. The copy counter is
//! changed with a conditional UPDATE, so concurrent checkouts of the last
//! copy serialize on the book row and only one of them finds a copy left.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::borrow::{Borrow, NewBorrow},
};

use super::BorrowStore;

const BORROW_COLUMNS: &str = "id, user_id, book_id, borrow_date, due_date, return_date, status";

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowStore for BorrowsRepository {
    async fn checkout(&self, borrow: &NewBorrow) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let taken: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE books SET copies_available = copies_available - 1
            WHERE id = $1 AND copies_available > 0
            RETURNING id
            "#,
        )
        .bind(borrow.book_id)
        .fetch_optional(&mut *tx)
        .await?;

        if taken.is_none() {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                .bind(borrow.book_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                AppError::Conflict(format!("No copy of book {} is available", borrow.book_id))
            } else {
                AppError::NotFound(format!("Book with id {} not found", borrow.book_id))
            });
        }

        let created = sqlx::query_as::<_, Borrow>(&format!(
            r#"
            INSERT INTO borrows (user_id, book_id, borrow_date, due_date, status)
            VALUES ($1, $2, $3, $4, 'ACTIVE')
            RETURNING {}
            "#,
            BORROW_COLUMNS
        ))
        .bind(borrow.user_id)
        .bind(borrow.book_id)
        .bind(borrow.borrow_date)
        .bind(borrow.due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn return_borrow(&self, id: i64, return_date: NaiveDate) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let returned = sqlx::query_as::<_, Borrow>(&format!(
            r#"
            UPDATE borrows SET status = 'RETURNED', return_date = $2
            WHERE id = $1 AND status = 'ACTIVE'
            RETURNING {}
            "#,
            BORROW_COLUMNS
        ))
        .bind(id)
        .bind(return_date)
        .fetch_optional(&mut *tx)
        .await?;

        let returned = match returned {
            Some(borrow) => borrow,
            None => {
                // either unknown or already returned; let the model say which
                let current = sqlx::query_as::<_, Borrow>(&format!(
                    "SELECT {} FROM borrows WHERE id = $1",
                    BORROW_COLUMNS
                ))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))?;
                current.ensure_returnable()?;
                return Err(AppError::Internal(format!(
                    "Borrow {} could not be returned",
                    id
                )));
            }
        };

        sqlx::query("UPDATE books SET copies_available = copies_available + 1 WHERE id = $1")
            .bind(returned.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(returned)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>(&format!(
            "SELECT {} FROM borrows WHERE id = $1",
            BORROW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Borrow>> {
        let borrows = sqlx::query_as::<_, Borrow>(&format!(
            "SELECT {} FROM borrows WHERE user_id = $1 ORDER BY borrow_date DESC, id DESC",
            BORROW_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(borrows)
    }

    async fn list_all(&self) -> AppResult<Vec<Borrow>> {
        let borrows = sqlx::query_as::<_, Borrow>(&format!(
            "SELECT {} FROM borrows ORDER BY borrow_date DESC, id DESC",
            BORROW_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(borrows)
    }
}
