//! CSV and image upload endpoints
//!
//! Both flows validate the upload before touching disk, work on a temp copy
//! that is removed when the handler returns, score the extracted texts, keep
//! the original file in storage and save the analysis.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use sentiscope_common::api::ApiResponse;
use sentiscope_common::db::InputType;
use serde::Serialize;

use super::analysis::{persist, title_or, AnalysisOutcome};
use super::extract::AuthUser;
use crate::db::analyses::NewAnalysis;
use crate::services::ai::ParsedComment;
use crate::services::csv_ingest::{extract_texts, parse_csv_file, select_text_column, TextColumn};
use crate::services::ocr::split_lines;
use crate::services::pipeline::{attach_metadata, optional_insights, score_texts};
use crate::services::sentiment::{CommentMetadata, MAX_BATCH_SIZE};
use crate::services::storage::StoredFile;
use crate::services::uploads::{read_multipart, TempUpload, UploadKind, UploadedFile};
use crate::{ApiError, ApiResult, AppState};

/// Options shared by both upload forms
#[derive(Debug)]
struct UploadOptions {
    title: Option<String>,
    save: bool,
    deep: bool,
    generate_insights: bool,
    use_ai: bool,
    text_column: Option<String>,
}

async fn receive(
    state: &AppState,
    multipart: &mut Multipart,
    kind: UploadKind,
) -> ApiResult<(UploadedFile, UploadOptions)> {
    let upload = read_multipart(multipart, kind, state.config.max_upload_bytes).await?;

    let options = UploadOptions {
        title: upload.field("title").map(str::to_string),
        save: upload.flag("save", true),
        deep: upload.flag("deep", false),
        generate_insights: upload.flag("generateInsights", true),
        use_ai: upload.flag("useAI", true),
        text_column: upload
            .field("textColumn")
            .or_else(|| upload.field("column"))
            .map(str::to_string),
    };

    let (file, _) = upload.require_file()?;
    Ok((file, options))
}

/// Keep the original upload; failures only lose the download link
async fn store_original(state: &AppState, user_id: &str, kind: UploadKind, file: &UploadedFile) -> Option<StoredFile> {
    match state
        .storage
        .store(user_id, kind.as_str(), &file.original_name, &file.bytes)
        .await
    {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(user_id = %user_id, file = %file.original_name, "Failed to store upload: {}", e);
            None
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvAnalysisResponse {
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub text_column: TextColumn,
    /// Non-empty cells in the column before truncation
    pub total_rows: usize,
}

/// POST /api/analysis/csv (multipart)
///
/// **Form fields:** `file` (.csv), `textColumn`?, `title`?, `useAI`?, `deep`?,
/// `generateInsights`?, `save`?
/// **Response:** `{results, statistics, aiInsights?, analysisId?, fileUrl?, textColumn, totalRows}`
///
/// **Errors:**
/// - 400 Bad Request: wrong extension, no file, no text in the chosen column
/// - 413 Payload Too Large: file over the upload limit
pub async fn analyze_csv(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<CsvAnalysisResponse>>> {
    let (file, options) = receive(&state, &mut multipart, UploadKind::Csv).await?;

    let temp = TempUpload::write(
        &state.config.root.uploads_dir(),
        UploadKind::Csv,
        &file.extension,
        &file.bytes,
    )
    .await?;

    let table = parse_csv_file(temp.path()).await?;
    let column = select_text_column(
        &table,
        options.text_column.as_deref(),
        &state.ai,
        options.use_ai,
    )
    .await?;
    let extracted = extract_texts(&table, column.index)?;

    tracing::info!(
        file = %file.original_name,
        column = %column.name,
        matched_by = ?column.matched_by,
        texts = extracted.texts.len(),
        "Analyzing CSV upload"
    );

    let scored = score_texts(
        &state.sentiment,
        &state.ai,
        &extracted.texts,
        options.deep,
        state.config.deep_group_delay,
    )
    .await?;
    let ai_insights = optional_insights(&state.ai, &scored, options.generate_insights).await;

    let stored = store_original(&state, &user.id, UploadKind::Csv, &file).await;

    let analysis_id = if options.save {
        let mut analysis = NewAnalysis::new(
            &user.id,
            title_or(options.title.as_deref(), || file.original_name.clone()),
            InputType::Csv,
        );
        analysis.file_path = stored.as_ref().map(|s| s.path.clone());
        analysis.file_url = stored.as_ref().map(|s| s.url.clone());
        analysis.ai_insights = ai_insights.clone();
        Some(persist(&state, &analysis, &scored.results).await?)
    } else {
        None
    };

    let message = format!("Analyzed {} texts from CSV", scored.results.len());
    Ok(Json(ApiResponse::ok(
        message,
        CsvAnalysisResponse {
            outcome: AnalysisOutcome {
                scored,
                ai_insights,
                analysis_id,
                file_url: stored.map(|s| s.url),
            },
            text_column: column,
            total_rows: extracted.available,
        },
    )))
}

/// Comment texts with their author metadata, index-aligned
fn comment_texts(comments: Vec<ParsedComment>) -> (Vec<String>, Vec<CommentMetadata>) {
    comments
        .into_iter()
        .map(|c| {
            (
                c.comment,
                CommentMetadata {
                    username: c.username,
                    timestamp: c.timestamp,
                },
            )
        })
        .unzip()
}

/// Texts recovered from OCR output, structured by the language model when possible
async fn texts_from_ocr(
    state: &AppState,
    ocr_text: &str,
    use_ai: bool,
) -> (Vec<String>, Vec<CommentMetadata>) {
    if use_ai && state.ai.is_available() {
        match state.ai.parse_comments(ocr_text).await {
            Ok(comments) if !comments.is_empty() => return comment_texts(comments),
            Ok(_) => tracing::info!("No comments recognised in OCR text, using raw lines"),
            Err(e) => tracing::warn!(error = %e.message, "Comment parsing failed, using raw lines"),
        }
    }

    (split_lines(ocr_text), Vec::new())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisResponse {
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub extracted_text: String,
}

/// POST /api/analysis/image (multipart)
///
/// **Form fields:** `file` (jpg, jpeg, png, gif, bmp, webp), `title`?, `useAI`?,
/// `deep`?, `generateInsights`?, `save`?
/// **Response:** `{results, statistics, aiInsights?, analysisId?, fileUrl?, extractedText}`
///
/// **Errors:**
/// - 400 Bad Request: wrong extension, no file, no text recognised
/// - 408 Request Timeout: OCR took too long
/// - 413 Payload Too Large: file over the upload limit
pub async fn analyze_image(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<ImageAnalysisResponse>>> {
    let (file, options) = receive(&state, &mut multipart, UploadKind::Image).await?;

    let temp = TempUpload::write(
        &state.config.root.uploads_dir(),
        UploadKind::Image,
        &file.extension,
        &file.bytes,
    )
    .await?;

    let ocr_text = state.ocr.extract_text(temp.path()).await?;
    if ocr_text.trim().is_empty() {
        return Err(ApiError::bad_request("No text found in image"));
    }

    let (mut texts, metadata) = texts_from_ocr(&state, &ocr_text, options.use_ai).await;
    if texts.is_empty() {
        return Err(ApiError::bad_request("No text found in image"));
    }
    if texts.len() > MAX_BATCH_SIZE {
        tracing::warn!(found = texts.len(), kept = MAX_BATCH_SIZE, "Too many texts in image, truncating");
        texts.truncate(MAX_BATCH_SIZE);
    }

    tracing::info!(file = %file.original_name, texts = texts.len(), "Analyzing image upload");

    let mut scored = score_texts(
        &state.sentiment,
        &state.ai,
        &texts,
        options.deep,
        state.config.deep_group_delay,
    )
    .await?;
    attach_metadata(&mut scored.results, &metadata);

    let ai_insights = optional_insights(&state.ai, &scored, options.generate_insights).await;

    let stored = store_original(&state, &user.id, UploadKind::Image, &file).await;

    let analysis_id = if options.save {
        let mut analysis = NewAnalysis::new(
            &user.id,
            title_or(options.title.as_deref(), || file.original_name.clone()),
            InputType::Image,
        );
        analysis.file_path = stored.as_ref().map(|s| s.path.clone());
        analysis.file_url = stored.as_ref().map(|s| s.url.clone());
        analysis.ai_insights = ai_insights.clone();
        Some(persist(&state, &analysis, &scored.results).await?)
    } else {
        None
    };

    let message = format!("Analyzed {} texts from image", scored.results.len());
    Ok(Json(ApiResponse::ok(
        message,
        ImageAnalysisResponse {
            outcome: AnalysisOutcome {
                scored,
                ai_insights,
                analysis_id,
                file_url: stored.map(|s| s.url),
            },
            extracted_text: ocr_text,
        },
    )))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis/csv", post(analyze_csv))
        .route("/api/analysis/image", post(analyze_image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_texts_keep_metadata() {
        let (texts, metadata) = comment_texts(vec![ParsedComment {
            username: "@budi".into(),
            timestamp: "1h".into(),
            comment: "Barangnya bagus".into(),
        }]);
        assert_eq!(texts, vec!["Barangnya bagus"]);
        assert_eq!(metadata[0].username, "@budi");
    }
}
