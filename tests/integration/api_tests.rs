//! API integration tests
//!
//! Drive the full router (gate, policy, handlers) against the in-memory
//! store with a manually driven clock.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use libris_server::{
    api,
    clock::ManualClock,
    config::{AppConfig, AuthConfig, DatabaseBackend},
    models::user::Role,
    repository::Repository,
    AppState,
};

struct TestApp {
    router: Router,
    repository: Repository,
    clock: ManualClock,
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.backend = DatabaseBackend::Memory;
    config.auth = AuthConfig {
        jwt_secret: "integration-test-secret".to_string(),
        argon2_memory_kib: 256,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..AuthConfig::default()
    };
    config
}

fn spawn_app() -> TestApp {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
    let repository = Repository::in_memory();
    let state = AppState::new(test_config(), repository.clone(), Arc::new(clock.clone())).unwrap();
    TestApp {
        router: api::create_router(state),
        repository,
        clock,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Send a JSON body verbatim, well-formed or not
    async fn send_raw(&self, method: Method, uri: &str, token: Option<&str>, body: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(&self, email: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": email,
                "password": "Analytical1"
            })),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Register a user and return a token for it
    async fn user_token(&self, email: &str) -> String {
        let (status, _) = self.register(email).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.login(email, "Analytical1").await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self, email: &str) -> String {
        let token = self.user_token(email).await;
        let user = self
            .repository
            .users
            .find_by_email(email)
            .await
            .unwrap()
            .unwrap();
        self.repository.users.update_role(user.id, Role::Admin).await.unwrap();
        token
    }

    async fn create_book(&self, token: &str, copies: i32) -> i64 {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/books",
                Some(token),
                Some(json!({
                    "title": "Dune",
                    "author": "Frank Herbert",
                    "isbn": "9780441013593",
                    "pub_year": 1965,
                    "copies_available": copies
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app();
    let (status, body) = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_register_and_login() {
    let app = spawn_app();

    let (status, body) = app.register("Ada@Example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].is_null());
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "USER");

    let (status, body) = app.login("ada@example.com", "Analytical1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");

    let token = body["token"].as_str().unwrap();
    let (status, me) = app.request(Method::GET, "/api/v1/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = spawn_app();
    let (status, _) = app.register("ada@example.com").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.register("ADA@example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn test_invalid_registration_lists_fields() {
    let app = spawn_app();
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "first_name": "",
                "last_name": "Lovelace",
                "email": "not-an-email",
                "password": "short"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"first_name"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let app = spawn_app();
    app.register("ada@example.com").await;

    let wrong_password = app.login("ada@example.com", "Wrong12345").await;
    let unknown_email = app.login("nobody@example.com", "Analytical1").await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password.1["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_anonymous_can_only_read_books() {
    let app = spawn_app();
    let token = app.user_token("ada@example.com").await;
    let book_id = app.create_book(&token, 2).await;
    let book_uri = format!("/api/v1/books/{}", book_id);

    let (status, _) = app.request(Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.request(Method::GET, &book_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune");

    let (status, _) = app
        .request(Method::POST, "/api/v1/books", None, Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request(Method::PUT, &book_uri, None, Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.request(Method::DELETE, &book_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_tokens_are_treated_as_anonymous() {
    let app = spawn_app();
    let token = app.user_token("ada@example.com").await;

    let (status, _) = app.request(Method::GET, "/api/v1/books", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::OK);

    let tampered = format!("{}x", token);
    let (status, _) = app
        .request(Method::GET, "/api/v1/borrows/me", Some(&tampered), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.clock.advance(chrono::Duration::hours(5));
    let (status, _) = app
        .request(Method::GET, "/api/v1/borrows/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_restricted_routes() {
    let app = spawn_app();
    let user = app.user_token("ada@example.com").await;
    let admin = app.admin_token("grace@example.com").await;

    let (status, body) = app.request(Method::GET, "/api/v1/borrows", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], 403);

    let (status, _) = app.request(Method::GET, "/api/v1/borrows", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let ada = app
        .repository
        .users
        .find_by_email("ada@example.com")
        .await
        .unwrap()
        .unwrap();
    let role_uri = format!("/api/v1/users/{}/role", ada.id);
    let (status, _) = app
        .request(Method::PUT, &role_uri, Some(&user), Some(json!({ "role": "ADMIN" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(Method::PUT, &role_uri, Some(&admin), Some(json!({ "role": "ADMIN" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");

    // role is read from the store, so the old token now carries admin rights
    let (status, _) = app.request(Method::GET, "/api/v1/borrows", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_borrow_lifecycle() {
    let app = spawn_app();
    let token = app.user_token("ada@example.com").await;
    let book_id = app.create_book(&token, 1).await;

    let (status, borrow) = app
        .request(
            Method::POST,
            &format!("/api/v1/books/{}/checkout", book_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(borrow["borrow_date"], "2024-01-01");
    assert_eq!(borrow["due_date"], "2024-01-15");
    assert_eq!(borrow["status"], "ACTIVE");
    let borrow_uri = format!("/api/v1/borrows/{}", borrow["id"].as_i64().unwrap());

    let (_, book) = app
        .request(Method::GET, &format!("/api/v1/books/{}", book_id), None, None)
        .await;
    assert_eq!(book["copies_available"], 0);

    // keep the token fresh while moving the calendar
    app.clock.set(Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap());
    let (status, body) = app.login("ada@example.com", "Analytical1").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, seen) = app.request(Method::GET, &borrow_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["status"], "OVERDUE");

    let (status, returned) = app
        .request(Method::POST, &format!("{}/return", borrow_uri), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "RETURNED");
    assert_eq!(returned["return_date"], "2024-01-20");

    let (status, body) = app
        .request(Method::POST, &format!("{}/return", borrow_uri), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], 422);

    let (_, book) = app
        .request(Method::GET, &format!("/api/v1/books/{}", book_id), None, None)
        .await;
    assert_eq!(book["copies_available"], 1);
}

#[tokio::test]
async fn test_concurrent_checkout_of_last_copy() {
    let app = spawn_app();
    let first = app.user_token("ada@example.com").await;
    let second = app.user_token("grace@example.com").await;
    let book_id = app.create_book(&first, 1).await;
    let uri = format!("/api/v1/books/{}/checkout", book_id);

    let (a, b) = tokio::join!(
        app.request(Method::POST, &uri, Some(&first), None),
        app.request(Method::POST, &uri, Some(&second), None),
    );
    let mut statuses = vec![a.0.as_u16(), b.0.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![201, 409]);

    let (_, book) = app
        .request(Method::GET, &format!("/api/v1/books/{}", book_id), None, None)
        .await;
    assert_eq!(book["copies_available"], 0);
}

#[tokio::test]
async fn test_only_borrower_or_admin_may_return() {
    let app = spawn_app();
    let owner = app.user_token("ada@example.com").await;
    let stranger = app.user_token("alan@example.com").await;
    let admin = app.admin_token("grace@example.com").await;
    let book_id = app.create_book(&owner, 1).await;

    let (_, borrow) = app
        .request(
            Method::POST,
            &format!("/api/v1/books/{}/checkout", book_id),
            Some(&owner),
            None,
        )
        .await;
    let return_uri = format!("/api/v1/borrows/{}/return", borrow["id"].as_i64().unwrap());

    let (status, _) = app.request(Method::POST, &return_uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/books/{}", book_id), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.request(Method::POST, &return_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/books/{}", book_id), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[test]
fn test_openapi_lists_every_route() {
    use utoipa::OpenApi;

    let doc = api::openapi::ApiDoc::openapi();
    for path in [
        "/health",
        "/auth/register",
        "/auth/login",
        "/auth/me",
        "/books",
        "/books/{id}",
        "/books/{id}/checkout",
        "/borrows",
        "/borrows/me",
        "/borrows/{id}",
        "/borrows/{id}/return",
        "/users/{id}/role",
    ] {
        assert!(doc.paths.paths.contains_key(path), "missing {}", path);
    }
    tokio_test::assert_ok!(serde_json::to_string(&doc));
}

fn assert_error_envelope(status: StatusCode, body: &Value, expected: StatusCode) {
    assert_eq!(status, expected);
    assert_eq!(body["status"], expected.as_u16());
    assert!(body["error"].is_string());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_missing_body_fields_use_error_envelope() {
    let app = spawn_app();
    let (status, body) = app
        .send_raw(Method::POST, "/api/v1/auth/register", None, r#"{"email":"a@b.co"}"#)
        .await;
    assert_error_envelope(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let app = spawn_app();
    let (status, body) = app
        .send_raw(Method::POST, "/api/v1/auth/login", None, "{not json")
        .await;
    assert_error_envelope(status, &body, StatusCode::BAD_REQUEST);

    let token = app.admin_token("admin@example.com").await;
    let (status, body) = app
        .send_raw(Method::POST, "/api/v1/books", Some(&token), r#"{"title": 42}"#)
        .await;
    assert_error_envelope(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_numeric_id_uses_error_envelope() {
    let app = spawn_app();
    let (status, body) = app.request(Method::GET, "/api/v1/books/abc", None, None).await;
    assert_error_envelope(status, &body, StatusCode::BAD_REQUEST);

    let token = app.user_token("ada@example.com").await;
    let (status, body) = app
        .request(Method::GET, "/api/v1/borrows/abc", Some(&token), None)
        .await;
    assert_error_envelope(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_not_found_envelope() {
    let app = spawn_app();
    let token = app.user_token("ada@example.com").await;
    let (status, body) = app
        .request(Method::GET, "/api/v1/nowhere", Some(&token), None)
        .await;
    assert_error_envelope(status, &body, StatusCode::NOT_FOUND);

    // the policy still answers before routing for anonymous callers
    let (status, body) = app.request(Method::GET, "/api/v1/nowhere", None, None).await;
    assert_error_envelope(status, &body, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_title_update_keeps_lent_copies_out() {
    let app = spawn_app();
    let admin = app.admin_token("admin@example.com").await;
    let reader = app.user_token("ada@example.com").await;
    let book_id = app.create_book(&admin, 2).await;
    let book_uri = format!("/api/v1/books/{}", book_id);

    let (status, _) = app
        .request(Method::POST, &format!("{}/checkout", book_uri), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, book) = app
        .request(Method::PUT, &book_uri, Some(&admin), Some(json!({ "title": "Dune Messiah" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Dune Messiah");
    assert_eq!(book["copies_available"], 1);
}
