//! Input validation run before any business logic
//!
//! Each function returns every rejected field at once so the client can fix
//! the whole form in one round trip.

use validator::{Validate, ValidationErrors};

use crate::{
    error::{AppError, AppResult, FieldError},
    models::{
        book::{CreateBook, UpdateBook},
        user::{LoginRequest, RegisterRequest},
    },
};

/// Flatten derive-based errors into field errors
pub fn collect_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                FieldError::new(field.clone(), message)
            })
        })
        .collect()
}

fn derived<T: Validate>(input: &T) -> Vec<FieldError> {
    match input.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => collect_errors(&errors),
    }
}

fn finish(mut errors: Vec<FieldError>) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        Err(AppError::Validation(errors))
    }
}

/// Password must hold at least one uppercase letter and one digit
pub fn password_strength(password: &str) -> Option<FieldError> {
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_upper && has_digit {
        None
    } else {
        Some(FieldError::new(
            "password",
            "Password must contain at least one uppercase letter and one number",
        ))
    }
}

pub fn validate_register(request: &RegisterRequest) -> AppResult<()> {
    let mut errors = derived(request);
    if let Some(e) = password_strength(&request.password) {
        errors.push(e);
    }
    for (field, value) in [
        ("first_name", &request.first_name),
        ("last_name", &request.last_name),
    ] {
        if !value.is_empty() && value.trim().is_empty() {
            errors.push(FieldError::new(field, "Must not be blank"));
        }
    }
    finish(errors)
}

pub fn validate_login(request: &LoginRequest) -> AppResult<()> {
    finish(derived(request))
}

fn pub_year_not_future(pub_year: i32, current_year: i32) -> Option<FieldError> {
    (pub_year > current_year)
        .then(|| FieldError::new("pub_year", "Publication year cannot be in the future"))
}

pub fn validate_create_book(request: &CreateBook, current_year: i32) -> AppResult<()> {
    let mut errors = derived(request);
    if request.title.trim().is_empty() && !request.title.is_empty() {
        errors.push(FieldError::new("title", "Title is required"));
    }
    if request.author.trim().is_empty() && !request.author.is_empty() {
        errors.push(FieldError::new("author", "Author is required"));
    }
    errors.extend(pub_year_not_future(request.pub_year, current_year));
    finish(errors)
}

pub fn validate_update_book(request: &UpdateBook, current_year: i32) -> AppResult<()> {
    let mut errors = derived(request);
    if let Some(year) = request.pub_year {
        errors.extend(pub_year_not_future(year, current_year));
    }
    finish(errors)
}
