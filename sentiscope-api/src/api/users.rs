//! Profile endpoints

use axum::{extract::State, routing::{delete, get}, Json, Router};
use sentiscope_common::api::{ApiResponse, FieldError};
use sentiscope_common::db::User;
use serde::Deserialize;

use super::extract::{AuthUser, JsonBody};
use crate::db::users::{self, ProfileUpdate};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl UpdateProfileRequest {
    fn into_update(self) -> Result<ProfileUpdate, ApiError> {
        let email = trimmed(self.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(ApiError::validation(vec![FieldError::new(
                    "email",
                    "Invalid email address",
                )]));
            }
        }

        Ok(ProfileUpdate {
            name: trimmed(self.name),
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            email,
        })
    }
}

/// GET /api/users/profile
pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<User>>> {
    let profile = users::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::ok("Profile retrieved successfully", profile)))
}

/// PUT /api/users/profile
///
/// **Request:** any of `{"name", "firstName", "lastName", "email"}`
///
/// **Errors:**
/// - 400 Bad Request: email malformed or used by another account
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let update = request.into_update()?;

    if let Some(email) = &update.email {
        if users::email_taken(&state.db, email, Some(&user.id)).await? {
            return Err(ApiError::bad_request("Email already registered"));
        }
    }

    let profile = users::update_profile(&state.db, &user.id, &update).await?;
    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(ApiResponse::ok("Profile updated successfully", profile)))
}

/// DELETE /api/users/account
///
/// Soft delete: the row stays, login and refresh stop working.
pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    users::soft_delete(&state.db, &user.id).await?;
    tracing::info!(user_id = %user.id, "Account deleted");

    Ok(Json(ApiResponse::message("Account deleted successfully")))
}

/// Build profile routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/profile", get(get_profile).put(update_profile))
        .route("/api/users/account", delete(delete_account))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_normalizes_fields() {
        let update = UpdateProfileRequest {
            name: Some("  Ana  ".into()),
            first_name: Some("   ".into()),
            last_name: None,
            email: Some(" Ana@Example.COM ".into()),
        }
        .into_update()
        .unwrap();

        assert_eq!(update.name.as_deref(), Some("Ana"));
        assert!(update.first_name.is_none());
        assert_eq!(update.email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_profile_update_rejects_bad_email() {
        let err = UpdateProfileRequest {
            email: Some("not-an-email".into()),
            ..Default::default()
        }
        .into_update()
        .unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
    }
}
