//! Error type for sentiscope-api
//!
//! Every failure that reaches a handler is an [`ApiError`]: an HTTP status
//! plus a user-facing message, optionally with per-field validation errors.
//! It serializes as `{"success": false, "message": ..., "errors": [...]}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sentiscope_common::api::FieldError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
#[error("{message} ({status})")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [FieldError]>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }

    /// Status from a numeric upstream code; unknown codes become 502
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(status, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn request_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 400 with per-field details
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Validation failed".to_string(),
            errors: Some(errors),
        }
    }

    /// The language model is not configured
    pub fn ai_unavailable() -> Self {
        Self::service_unavailable("AI service is not available")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, "{}", self.message);
        }

        let body = ErrorBody {
            success: false,
            message: &self.message,
            errors: self.errors.as_deref(),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<sentiscope_common::Error> for ApiError {
    fn from(err: sentiscope_common::Error) -> Self {
        use sentiscope_common::Error;

        match err {
            Error::NotFound(msg) => ApiError::not_found(msg),
            Error::InvalidInput(msg) => ApiError::bad_request(msg),
            other => {
                error!("Common error: {}", other);
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        error!("Database error: {}", err);
        ApiError::internal("Database error")
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ApiError::request_timeout("Upstream request timed out");
        }
        error!("Upstream request failed: {}", err);
        ApiError::new(StatusCode::BAD_GATEWAY, "Upstream service request failed")
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        error!("IO error: {}", err);
        ApiError::internal("Internal server error")
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_envelope() {
        let response = ApiError::bad_request("Text cannot be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Text cannot be empty");
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_common_error_mapping() {
        let err: ApiError = sentiscope_common::Error::NotFound("Analysis not found".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Analysis not found");

        let err: ApiError = sentiscope_common::Error::Config("bad".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unknown_upstream_status() {
        let err = ApiError::from_status_code(1000, "odd");
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        let err = ApiError::from_status_code(429, "slow down");
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
    }
}
