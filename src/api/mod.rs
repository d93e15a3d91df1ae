//! API handlers for Libris REST endpoints
//!
//! Every request passes two middleware layers before reaching a handler:
//! [`authenticate`] attaches a [`RequestIdentity`] to the request and
//! [`authorize`] checks it against the route policy.

pub mod auth;
pub mod books;
pub mod borrows;
pub mod health;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    security::{Decision, Denial, Principal, RequestIdentity},
    AppState,
};

/// Extractor for the authenticated caller
pub struct AuthenticatedUser(pub Principal);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestIdentity>() {
            Some(RequestIdentity::Authenticated(principal)) => Ok(AuthenticatedUser(principal.clone())),
            _ => Err(AppError::Authentication("Authentication required".to_string())),
        }
    }
}

/// Resolve the bearer token, if any, into the request identity. Never rejects.
pub async fn authenticate(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = state
        .services
        .gate
        .identify(bearer.as_ref().map(|header| header.0.token()))
        .await;
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Apply the route policy to the identity attached by [`authenticate`]
pub async fn authorize(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<RequestIdentity>()
        .cloned()
        .unwrap_or_default();

    match state
        .policy
        .decide(request.method(), request.uri().path(), &identity)
    {
        Decision::Allow => next.run(request).await,
        Decision::Deny(Denial::Unauthenticated) => {
            AppError::Authentication("Authentication required".to_string()).into_response()
        }
        Decision::Deny(Denial::Forbidden) => {
            AppError::Authorization("Insufficient permissions".to_string()).into_response()
        }
    }
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/checkout", post(books::checkout_book))
        // Borrows
        .route("/borrows", get(borrows::list_borrows))
        .route("/borrows/me", get(borrows::my_borrows))
        .route("/borrows/:id", get(borrows::get_borrow))
        .route("/borrows/:id/return", post(borrows::return_borrow))
        // Users
        .route("/users/:id/role", put(users::update_role))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .fallback(not_found)
        // policy runs inside the gate so it sees the identity
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .layer(middleware::from_fn_with_state(state, authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
