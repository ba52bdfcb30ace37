//! Response envelopes
//!
//! Every `/api` response is wrapped as `{success, message, data}`. Errors use
//! the same shape with `success: false` and no `data`.

use serde::{Deserialize, Serialize};

use super::pagination::Pagination;

/// Standard success envelope
///
/// # Examples
///
/// ```
/// use sentiscope_common::api::ApiResponse;
///
/// let response = ApiResponse::ok("Fetched", 42);
/// let json = serde_json::to_value(&response).unwrap();
/// assert_eq!(json["success"], true);
/// assert_eq!(json["data"], 42);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success envelope without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// One field-level validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Page of results plus pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}
