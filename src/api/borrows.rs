//! Borrow endpoints

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};

use crate::{error::AppResult, models::borrow::Borrow};

use super::AuthenticatedUser;

/// List every borrow (admin)
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All borrows, newest first", body = Vec<Borrow>),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_borrows(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Borrow>>> {
    let borrows = state.services.borrows.list_all().await?;
    Ok(Json(borrows))
}

/// List the caller's borrows
#[utoipa::path(
    get,
    path = "/borrows/me",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's borrows, newest first", body = Vec<Borrow>)
    )
)]
pub async fn my_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<Vec<Borrow>>> {
    let borrows = state.services.borrows.list_mine(&principal).await?;
    Ok(Json(borrows))
}

/// Get one borrow (owner or admin)
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Borrow details", body = Borrow),
        (status = 403, description = "Not the borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrow not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Borrow>> {
    let Path(id) = id?;
    let borrow = state.services.borrows.get(&principal, id).await?;
    Ok(Json(borrow))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Borrow returned", body = Borrow),
        (status = 403, description = "Not the borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrow not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Borrow>> {
    let Path(id) = id?;
    let borrow = state.services.borrows.return_borrow(&principal, id).await?;
    Ok(Json(borrow))
}
