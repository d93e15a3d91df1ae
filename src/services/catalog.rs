//! Catalog management service

use std::sync::Arc;

use chrono::Datelike;

use crate::{
    clock::Clock,
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
    repository::Repository,
    validation,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    fn current_year(&self) -> i32 {
        self.clock.today().year()
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        validation::validate_create_book(&book, self.current_year())?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!("Created book {} ({})", created.id, created.isbn);
        Ok(created)
    }

    /// Partial update: fields left out of `changes` keep their value
    pub async fn update_book(&self, id: i64, changes: UpdateBook) -> AppResult<Book> {
        validation::validate_update_book(&changes, self.current_year())?;
        self.repository.books.update(id, &changes).await
    }

    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Deleted book {}", id);
        Ok(())
    }
}
