//! Authentication endpoints
//!
//! POST /api/auth/register, /login, /refresh are public; the rest require a
//! bearer access token.

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use sentiscope_common::api::ApiResponse;
use sentiscope_common::db::User;
use serde::{Deserialize, Serialize};

use super::extract::{AuthUser, JsonBody};
use crate::services::auth::{AuthSession, LoginRequest, RegisterRequest};
use crate::services::tokens::TokenPair;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: User,
}

/// POST /api/auth/register
///
/// **Request:** `{"email", "password", "name"?, "firstName"?, "lastName"?}`
/// **Response:** 201 with `{user, accessToken, refreshToken, expiresIn}`
///
/// **Errors:**
/// - 400 Bad Request: missing fields, short password, email already registered
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AuthSession>>)> {
    let session = state.auth.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User registered successfully", session)),
    ))
}

/// POST /api/auth/login
///
/// **Request:** `{"email", "password"}`
/// **Response:** `{user, accessToken, refreshToken, expiresIn}`
///
/// **Errors:**
/// - 401 Unauthorized: unknown email or wrong password
/// - 403 Forbidden: account deactivated
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<Json<ApiResponse<AuthSession>>> {
    let session = state.auth.login(request).await?;
    Ok(Json(ApiResponse::ok("Login successful", session)))
}

/// POST /api/auth/refresh
///
/// **Request:** `{"refreshToken"}`
/// **Response:** a rotated `{accessToken, refreshToken, expiresIn}`
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> ApiResult<Json<ApiResponse<TokenPair>>> {
    let tokens = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(ApiResponse::ok("Token refreshed successfully", tokens)))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.auth.logout(&user.id).await?;
    Ok(Json(ApiResponse::message("Logout successful")))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<UserPayload>>> {
    let user = state.auth.me(&user.id).await?;
    Ok(Json(ApiResponse::ok("User retrieved successfully", UserPayload { user })))
}

/// POST /api/auth/change-password
///
/// **Request:** `{"currentPassword", "newPassword"}`
///
/// **Errors:**
/// - 400 Bad Request: missing or short password
/// - 401 Unauthorized: current password is wrong
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state
        .auth
        .change_password(&user.id, &request.current_password, &request.new_password)
        .await?;
    Ok(Json(ApiResponse::message("Password changed successfully")))
}

/// POST /api/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.auth.verify_email(&user.id).await?;
    Ok(Json(ApiResponse::message("Email verified successfully")))
}

/// Build authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/auth/verify-email", post(verify_email))
}
