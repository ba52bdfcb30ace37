//! Health check and API index

use axum::{extract::State, http::Uri, routing::get, Json, Router};
use chrono::Utc;
use sentiscope_common::api::ApiResponse;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{ApiError, AppState};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("sentiscope-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Whether the language model is configured
    pub ai_available: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "sentiscope-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        ai_available: state.ai.is_available(),
    })
}

/// GET /api
pub async fn api_info() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::ok(
        "SentiScope API",
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": "/api/auth",
                "users": "/api/users",
                "analysis": "/api/analysis",
                "datasets": "/api/datasets",
            },
            "status": "online",
        }),
    ))
}

/// Fallback for unmatched routes
pub async fn route_not_found(uri: Uri) -> ApiError {
    let path = uri
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or_else(|| uri.path());
    ApiError::not_found(format!("Route {} not found", path))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api", get(api_info))
}
