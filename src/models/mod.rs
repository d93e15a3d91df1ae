//! Data models for Libris

pub mod book;
pub mod borrow;
pub mod user;

// Re-export commonly used types
pub use book::{Book, CreateBook, UpdateBook};
pub use borrow::{Borrow, BorrowStatus, NewBorrow};
pub use user::{NewUser, Role, User, UserClaims};
