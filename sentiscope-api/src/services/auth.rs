//! Account registration, login and token refresh
//!
//! Passwords are bcrypt-hashed on the blocking pool.

use serde::{Deserialize, Serialize};
use sentiscope_common::api::FieldError;
use sentiscope_common::db::User;
use sqlx::SqlitePool;

use super::tokens::{TokenPair, TokenService};
use crate::db::users::{self, NewUser};
use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

pub async fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| {
            tracing::error!("bcrypt hash failed: {}", e);
            ApiError::internal("Failed to hash password")
        })
}

/// A malformed stored hash counts as a mismatch
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::internal(format!("Password verification task failed: {}", e)))?;

    Ok(verified.unwrap_or_else(|e| {
        tracing::warn!("bcrypt verify failed: {}", e);
        false
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User plus a fresh token pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Explicit name, else first + last, else the email's local part
pub fn display_name(request: &RegisterRequest) -> String {
    if let Some(name) = non_empty(&request.name) {
        return name;
    }

    let full = [non_empty(&request.first_name), non_empty(&request.last_name)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !full.is_empty() {
        return full;
    }

    request
        .email
        .split('@')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let mut errors = Vec::new();
    let email = email.trim();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !email.contains(' '));
    if !valid_email {
        errors.push(FieldError::new("email", "Please provide a valid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(errors))
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: SqlitePool,
    tokens: TokenService,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(db: SqlitePool, tokens: TokenService, bcrypt_cost: u32) -> Self {
        Self {
            db,
            tokens,
            bcrypt_cost,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    fn session(&self, user: User) -> Result<AuthSession, ApiError> {
        let tokens = self.tokens.issue_pair(&user.id, &user.email, &user.role)?;
        Ok(AuthSession { user, tokens })
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, ApiError> {
        validate_credentials(&request.email, &request.password)?;

        let email = request.email.trim().to_lowercase();
        if users::email_taken(&self.db, &email, None).await? {
            return Err(ApiError::bad_request("Email already registered"));
        }

        let password_hash = hash_password(&request.password, self.bcrypt_cost).await?;
        let user = users::create_user(
            &self.db,
            &NewUser {
                email,
                password_hash,
                name: Some(display_name(&request)),
                first_name: non_empty(&request.first_name),
                last_name: non_empty(&request.last_name),
            },
        )
        .await?;

        users::record_login(&self.db, &user.id).await?;
        tracing::info!(user_id = %user.id, "Registered user");

        self.session(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, ApiError> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(ApiError::bad_request("Email and password are required"));
        }

        let invalid = || ApiError::unauthorized("Invalid email or password");

        let user = users::find_by_email(&self.db, request.email.trim())
            .await?
            .ok_or_else(invalid)?;

        if !user.is_active {
            return Err(ApiError::forbidden(
                "Account is deactivated. Please contact support.",
            ));
        }

        if !verify_password(&request.password, &user.password_hash).await? {
            tracing::info!(user_id = %user.id, "Failed login attempt");
            return Err(invalid());
        }

        users::record_login(&self.db, &user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        self.session(user)
    }

    /// Exchange a refresh token for a new pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        if refresh_token.trim().is_empty() {
            return Err(ApiError::bad_request("Refresh token is required"));
        }

        let claims = self.tokens.verify_refresh(refresh_token)?;
        let user = users::find_by_id(&self.db, &claims.sub)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if !user.is_active {
            return Err(ApiError::forbidden("Account is deactivated"));
        }

        self.tokens.issue_pair(&user.id, &user.email, &user.role)
    }

    pub async fn me(&self, user_id: &str) -> Result<User, ApiError> {
        users::find_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Tokens are stateless; logout only records activity
    pub async fn logout(&self, user_id: &str) -> Result<(), ApiError> {
        users::touch(&self.db, user_id).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(ApiError::bad_request(
                "Current password and new password are required",
            ));
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(vec![FieldError::new(
                "newPassword",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            )]));
        }

        let user = self.me(user_id).await?;
        if !verify_password(current_password, &user.password_hash).await? {
            return Err(ApiError::unauthorized("Current password is incorrect"));
        }

        let hash = hash_password(new_password, self.bcrypt_cost).await?;
        users::update_password(&self.db, user_id, &hash).await?;
        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn verify_email(&self, user_id: &str) -> Result<(), ApiError> {
        users::mark_email_verified(&self.db, user_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentiscope_common::db::init_database;
    use tempfile::TempDir;

    async fn service() -> (TempDir, AuthService) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.db")).await.unwrap();
        let tokens = TokenService::new("a", "r", 3600, 7200);
        (dir, AuthService::new(pool, tokens, 4))
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "secret1".into(),
            first_name: Some("Ana".into()),
            last_name: Some("Putri".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut request = register_request("ana@example.com");
        assert_eq!(display_name(&request), "Ana Putri");
        request.last_name = None;
        assert_eq!(display_name(&request), "Ana");
        request.first_name = Some("  ".into());
        assert_eq!(display_name(&request), "ana");
        request.name = Some("A. Putri".into());
        assert_eq!(display_name(&request), "A. Putri");
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (_dir, auth) = service().await;
        let session = auth.register(register_request("Ana@Example.com")).await.unwrap();
        assert_eq!(session.user.email, "ana@example.com");
        assert_eq!(session.user.name.as_deref(), Some("Ana Putri"));

        let login = auth
            .login(LoginRequest {
                email: "ana@example.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, session.user.id);
        assert!(login.user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_and_weak_registration() {
        let (_dir, auth) = service().await;
        auth.register(register_request("ana@example.com")).await.unwrap();

        let err = auth.register(register_request("ANA@example.com")).await.unwrap_err();
        assert_eq!(err.message, "Email already registered");

        let mut weak = register_request("bob@example.com");
        weak.password = "123".into();
        let err = auth.register(weak).await.unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert_eq!(err.errors.unwrap()[0].field, "password");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email() {
        let (_dir, auth) = service().await;
        auth.register(register_request("ana@example.com")).await.unwrap();

        for (email, password) in [("ana@example.com", "wrong!!"), ("nobody@example.com", "secret1")] {
            let err = auth
                .login(LoginRequest {
                    email: email.into(),
                    password: password.into(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.status.as_u16(), 401);
            assert_eq!(err.message, "Invalid email or password");
        }
    }

    #[tokio::test]
    async fn test_refresh_and_change_password() {
        let (_dir, auth) = service().await;
        let session = auth.register(register_request("ana@example.com")).await.unwrap();

        let pair = auth.refresh(&session.tokens.refresh_token).await.unwrap();
        assert!(auth.tokens().verify_access(&pair.access_token).is_ok());
        assert_eq!(
            auth.refresh(&session.tokens.access_token).await.unwrap_err().message,
            "Invalid refresh token"
        );

        let err = auth
            .change_password(&session.user.id, "nope-nope", "newsecret")
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 401);

        auth.change_password(&session.user.id, "secret1", "newsecret")
            .await
            .unwrap();
        auth.login(LoginRequest {
            email: "ana@example.com".into(),
            password: "newsecret".into(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_deleted_user_cannot_log_in() {
        let (_dir, auth) = service().await;
        let session = auth.register(register_request("ana@example.com")).await.unwrap();
        users::soft_delete(&auth.db, &session.user.id).await.unwrap();

        let err = auth
            .login(LoginRequest {
                email: "ana@example.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 401);
        assert_eq!(auth.refresh(&session.tokens.refresh_token).await.unwrap_err().status.as_u16(), 404);
    }
}
