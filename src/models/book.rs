//! Book (catalog entry) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub pub_year: i32,
    /// Copies currently on the shelf
    pub copies_available: i32,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 50, message = "Title must be 1 to 50 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 50, message = "Author must be 1 to 50 characters"))]
    pub author: String,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 to 13 characters"))]
    pub isbn: String,
    #[validate(range(min = 1000, message = "Publication year must be valid"))]
    pub pub_year: i32,
    #[validate(range(min = 1, message = "At least one copy is required"))]
    pub copies_available: i32,
    pub cover_image_url: Option<String>,
}

/// Partial update request: absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 50, message = "Title must be 1 to 50 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Author must be 1 to 50 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 to 13 characters"))]
    pub isbn: Option<String>,
    #[validate(range(min = 1000, message = "Publication year must be valid"))]
    pub pub_year: Option<i32>,
    #[validate(range(min = 0, message = "Copies available cannot be negative"))]
    pub copies_available: Option<i32>,
    pub cover_image_url: Option<String>,
}

impl UpdateBook {
    /// Apply the present fields onto `book`
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(title) = &self.title {
            book.title = title.clone();
        }
        if let Some(author) = &self.author {
            book.author = author.clone();
        }
        if let Some(isbn) = &self.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(pub_year) = self.pub_year {
            book.pub_year = pub_year;
        }
        if let Some(copies) = self.copies_available {
            book.copies_available = copies;
        }
        if let Some(url) = &self.cover_image_url {
            book.cover_image_url = Some(url.clone());
        }
    }
}
