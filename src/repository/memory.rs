//! In-process store used with `database.backend = "memory"` and by tests
//!
//! One lock guards users, books and borrows together, so each trait method
//! that mutates runs as a single critical section.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        borrow::{Borrow, NewBorrow},
        user::{NewUser, Role, User},
    },
};

use super::{BookStore, BorrowStore, UserStore};

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    books: BTreeMap<i64, Book>,
    borrows: BTreeMap<i64, Borrow>,
    next_user_id: i64,
    next_book_id: i64,
    next_borrow_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

fn user_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}

fn book_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn borrow_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Borrow with id {} not found", id))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        let state = self.state.read().await;
        state.users.get(&id).cloned().ok_or_else(|| user_not_found(id))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        let id = next(&mut state.next_user_id);
        let created = User {
            id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.to_lowercase(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn update_role(&self, id: i64, role: Role) -> AppResult<User> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| user_not_found(id))?;
        user.role = role;
        Ok(user.clone())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        Ok(state.books.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        let state = self.state.read().await;
        state.books.get(&id).cloned().ok_or_else(|| book_not_found(id))
    }

    async fn exists(&self, id: i64) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state.books.contains_key(&id))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let id = next(&mut state.next_book_id);
        let created = Book {
            id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            pub_year: book.pub_year,
            copies_available: book.copies_available,
            cover_image_url: book.cover_image_url.clone(),
            created_at: Utc::now(),
        };
        state.books.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, changes: &UpdateBook) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let book = state.books.get_mut(&id).ok_or_else(|| book_not_found(id))?;
        changes.apply_to(book);
        Ok(book.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.books.contains_key(&id) {
            return Err(book_not_found(id));
        }
        if state
            .borrows
            .values()
            .any(|b| b.book_id == id && !b.is_returned())
        {
            return Err(AppError::Conflict(
                "Book has copies that are still borrowed".to_string(),
            ));
        }
        state.books.remove(&id);
        state.borrows.retain(|_, b| b.book_id != id);
        Ok(())
    }
}

#[async_trait]
impl BorrowStore for MemoryStore {
    async fn checkout(&self, borrow: &NewBorrow) -> AppResult<Borrow> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let book = state
            .books
            .get_mut(&borrow.book_id)
            .ok_or_else(|| book_not_found(borrow.book_id))?;
        if book.copies_available <= 0 {
            return Err(AppError::Conflict(format!(
                "No copy of book {} is available",
                borrow.book_id
            )));
        }
        book.copies_available -= 1;

        let id = next(&mut state.next_borrow_id);
        let created = borrow.clone().into_borrow(id);
        state.borrows.insert(id, created.clone());
        Ok(created)
    }

    async fn return_borrow(&self, id: i64, return_date: NaiveDate) -> AppResult<Borrow> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let borrow = state.borrows.get_mut(&id).ok_or_else(|| borrow_not_found(id))?;
        borrow.mark_returned(return_date)?;
        let returned = borrow.clone();

        if let Some(book) = state.books.get_mut(&returned.book_id) {
            book.copies_available += 1;
        }
        Ok(returned)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Borrow> {
        let state = self.state.read().await;
        state.borrows.get(&id).cloned().ok_or_else(|| borrow_not_found(id))
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Borrow>> {
        let state = self.state.read().await;
        Ok(state
            .borrows
            .values()
            .rev()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<Borrow>> {
        let state = self.state.read().await;
        Ok(state.borrows.values().rev().cloned().collect())
    }
}
