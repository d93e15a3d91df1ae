//! Registration, login and user administration

use crate::{
    error::{AppError, AppResult},
    models::user::{AuthResponse, LoginRequest, NewUser, RegisterRequest, Role, User},
    repository::Repository,
    security::{PasswordHasher, Principal, TokenCodec},
    validation,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    hasher: PasswordHasher,
    tokens: TokenCodec,
}

impl AuthService {
    pub fn new(repository: Repository, hasher: PasswordHasher, tokens: TokenCodec) -> Self {
        Self {
            repository,
            hasher,
            tokens,
        }
    }

    /// Create a USER account. No token is issued; the client logs in next.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        validation::validate_register(&request)?;

        let email = request.email.trim().to_lowercase();
        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        let password = request.password.clone();
        let password_hash = self
            .with_hasher(move |hasher| hasher.hash(&password))
            .await??;
        let user = self
            .repository
            .users
            .create(&NewUser {
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                email,
                password_hash,
                role: Role::User,
            })
            .await?;

        tracing::info!("Registered user {} ({})", user.id, user.email);
        Ok(AuthResponse {
            token: None,
            token_type: None,
            email: user.email,
            role: user.role,
        })
    }

    /// Check credentials and issue a token. Unknown email and wrong password
    /// fail the same way and cost the same work.
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        validation::validate_login(&request)?;

        let email = request.email.trim().to_lowercase();
        let user = match self.repository.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                let password = request.password;
                self.with_hasher(move |hasher| hasher.verify_dummy(&password))
                    .await?;
                tracing::info!("Failed login for unknown email {}", email);
                return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
            }
        };

        let password = request.password;
        let stored_hash = user.password_hash.clone();
        let valid = self
            .with_hasher(move |hasher| hasher.verify(&password, &stored_hash))
            .await?;
        if !valid {
            tracing::info!("Failed login for user {}", user.id);
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.tokens.issue(&user)?;
        Ok(AuthResponse {
            token: Some(token),
            token_type: Some("Bearer".to_string()),
            email: user.email,
            role: user.role,
        })
    }

    /// Stored profile of the caller
    pub async fn me(&self, principal: &Principal) -> AppResult<User> {
        self.repository.users.get_by_id(principal.user_id).await
    }

    /// Argon2 is CPU-bound; keep it off the async workers
    async fn with_hasher<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&PasswordHasher) -> T + Send + 'static,
        T: Send + 'static,
    {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || work(&hasher))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))
    }

    pub async fn update_role(&self, user_id: i64, role: Role) -> AppResult<User> {
        let user = self.repository.users.update_role(user_id, role).await?;
        tracing::info!("User {} is now {}", user.id, user.role);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        security::test_auth_config,
    };
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn service() -> AuthService {
        let config = test_auth_config();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        AuthService::new(
            Repository::in_memory(),
            PasswordHasher::new(&config).unwrap(),
            TokenCodec::new(&config, Arc::new(clock)),
        )
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password: "Analytical1".into(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let registered = service.register(register_request("Ada@Example.com")).await.unwrap();
        assert!(registered.token.is_none());
        assert_eq!(registered.email, "ada@example.com");
        assert_eq!(registered.role, Role::User);

        let logged_in = service
            .login(LoginRequest {
                email: "ADA@example.com".into(),
                password: "Analytical1".into(),
            })
            .await
            .unwrap();
        assert!(logged_in.token.is_some());
        assert_eq!(logged_in.token_type.as_deref(), Some("Bearer"));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let service = service();
        service.register(register_request("ada@example.com")).await.unwrap();
        let again = service.register(register_request("ADA@example.com")).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_weak_password_is_rejected() {
        let service = service();
        let mut request = register_request("ada@example.com");
        request.password = "lowercase".into();
        match service.register(request).await {
            Err(AppError::Validation(errors)) => {
                assert!(errors.iter().all(|e| e.field == "password"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|r| r.email)),
        }
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service();
        service.register(register_request("ada@example.com")).await.unwrap();

        let wrong_password = service
            .login(LoginRequest {
                email: "ada@example.com".into(),
                password: "Wrong1234".into(),
            })
            .await
            .unwrap_err();
        let unknown_email = service
            .login(LoginRequest {
                email: "nobody@example.com".into(),
                password: "Analytical1".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::Authentication(_)));
        assert!(matches!(unknown_email, AppError::Authentication(_)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_login_on_single_threaded_runtime() {
        let service = service();
        service.register(register_request("ada@example.com")).await.unwrap();

        let (logged_in, health) = tokio::join!(
            service.login(LoginRequest {
                email: "ada@example.com".into(),
                password: "Analytical1".into(),
            }),
            async { "still serving" }
        );
        assert!(logged_in.unwrap().token.is_some());
        assert_eq!(health, "still serving");
    }
}
