//! Repository layer: store traits and their backends
//!
//! Every mutation that touches more than one record (checkout, return) is a
//! single store call so each backend can make it atomic.

pub mod books;
pub mod borrows;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        borrow::{Borrow, NewBorrow},
        user::{NewUser, Role, User},
    },
};

/// Credential store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<User>;

    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    /// Fails with `Conflict` when the email is already registered
    async fn create(&self, user: &NewUser) -> AppResult<User>;

    async fn update_role(&self, id: i64, role: Role) -> AppResult<User>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Book>>;

    async fn get_by_id(&self, id: i64) -> AppResult<Book>;

    async fn exists(&self, id: i64) -> AppResult<bool>;

    async fn create(&self, book: &CreateBook) -> AppResult<Book>;

    /// Apply the fields present in `changes` in one step; absent fields,
    /// `copies_available` included, keep their stored value
    async fn update(&self, id: i64, changes: &UpdateBook) -> AppResult<Book>;

    /// Fails with `Conflict` while the book has unreturned borrows
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowStore: Send + Sync {
    /// Take one copy of the book and record the borrow, atomically.
    /// Fails with `Conflict` when no copy is available.
    async fn checkout(&self, borrow: &NewBorrow) -> AppResult<Borrow>;

    /// Mark the borrow returned and put the copy back, atomically.
    /// Fails with `BusinessRule` when the borrow is already returned.
    async fn return_borrow(&self, id: i64, return_date: NaiveDate) -> AppResult<Borrow>;

    async fn get_by_id(&self, id: i64) -> AppResult<Borrow>;

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Borrow>>;

    async fn list_all(&self) -> AppResult<Vec<Borrow>>;
}

/// Store handles shared by every service
#[derive(Clone)]
pub struct Repository {
    pub users: Arc<dyn UserStore>,
    pub books: Arc<dyn BookStore>,
    pub borrows: Arc<dyn BorrowStore>,
}

impl Repository {
    /// Postgres-backed repository
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            borrows: Arc::new(borrows::BorrowsRepository::new(pool)),
        }
    }

    /// Process-local repository; all three stores share one state
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            users: store.clone(),
            books: store.clone(),
            borrows: store,
        }
    }
}

/// Map a unique-key violation to `Conflict`, anything else to `Database`
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(err),
    }
}
