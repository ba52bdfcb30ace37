//! Stored upload downloads
//!
//! Files are only returned to the user whose id is the first path segment.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use super::AuthUser;
use crate::services::storage::FILES_ROUTE;
use crate::{ApiResult, AppState};

/// Content type from the stored file's extension
pub fn content_type_for(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => "text/csv; charset=utf-8",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// GET /files/*path
///
/// **Response:** the raw file bytes
///
/// **Errors:**
/// - 401 without a valid access token
/// - 404 when the file is missing or belongs to another user
pub async fn download_file(
    State(state): State<AppState>,
    user: AuthUser,
    Path(path): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.storage.read_owned(&user.id, &path).await?;

    tracing::debug!(user_id = %user.id, %path, bytes = bytes.len(), "Serving stored file");

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&path)),
            (header::CACHE_CONTROL, "private, no-store"),
        ],
        bytes,
    ))
}

/// Build stored file routes
pub fn file_routes() -> Router<AppState> {
    Router::new().route(&format!("{}/*path", FILES_ROUTE), get(download_file))
}
