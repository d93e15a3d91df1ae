//! User administration endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};

use crate::{
    error::AppResult,
    models::user::{UpdateRole, User},
};

/// Change a user's role (admin)
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateRole,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_role(
    State(state): State<crate::AppState>,
    id: Result<Path<i64>, PathRejection>,
    request: Result<Json<UpdateRole>, JsonRejection>,
) -> AppResult<Json<User>> {
    let Path(id) = id?;
    let Json(request) = request?;
    let user = state.services.auth.update_role(id, request.role).await?;
    Ok(Json(user))
}
