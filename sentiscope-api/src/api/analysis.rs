//! Text analysis, history and report endpoints
//!
//! All routes require authentication. Text, batch and deep analyses are
//! persisted per user unless the request opts out with `"save": false`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use sentiscope_common::api::{calculate_pagination, ApiResponse, PageQuery, Paginated};
use sentiscope_common::db::{Analysis, AnalysisWithItems, InputType};
use sentiscope_common::time::parse_boundary;
use serde::{Deserialize, Serialize};

use super::extract::{AuthUser, JsonBody};
use crate::db::analyses::{self, NewAnalysis, ReportTotals};
use crate::services::pipeline::{optional_insights, score_texts, ScoredTexts};
use crate::services::sentiment::{Sentiment, TextAnalysisResult};
use crate::{ApiError, ApiResult, AppState};

/// Characters of the text used as a default title
const TITLE_PREVIEW_CHARS: usize = 50;

fn default_true() -> bool {
    true
}

/// Title from the request, or `fallback` when absent or blank
pub(crate) fn title_or(requested: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    requested
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(fallback)
}

fn preview_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > TITLE_PREVIEW_CHARS {
        let cut: String = trimmed.chars().take(TITLE_PREVIEW_CHARS).collect();
        format!("{}...", cut.trim_end())
    } else {
        trimmed.to_string()
    }
}

/// Scored texts as returned to the client, with persistence details
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    #[serde(flatten)]
    pub scored: ScoredTexts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

/// Persist scored results and return the new analysis id
pub(crate) async fn persist(
    state: &AppState,
    analysis: &NewAnalysis,
    results: &[TextAnalysisResult],
) -> ApiResult<String> {
    let saved = analyses::save_analysis(&state.db, analysis, results).await?;
    tracing::info!(
        analysis_id = %saved.analysis.id,
        user_id = %analysis.user_id,
        input_type = analysis.input_type.as_str(),
        items = saved.items.len(),
        "Analysis saved"
    );
    Ok(saved.analysis.id)
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    #[serde(default)]
    pub text: String,
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub save: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeTextResponse {
    #[serde(flatten)]
    pub result: TextAnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
}

/// POST /api/analysis/analyze
///
/// **Request:** `{"text", "title"?, "save"?}`
/// **Response:** 201 with `{text, sentiment: {label, score}, keywords, analysisId}`
///
/// **Errors:**
/// - 400 Bad Request: empty text
/// - 408/500/503: classifier failures
pub async fn analyze_text(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<AnalyzeTextRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AnalyzeTextResponse>>)> {
    let result = state.sentiment.analyze_single(&request.text).await?;

    let analysis_id = if request.save {
        let title = title_or(request.title.as_deref(), || preview_title(&result.text));
        let analysis = NewAnalysis::new(&user.id, title, InputType::Text);
        Some(persist(&state, &analysis, std::slice::from_ref(&result)).await?)
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Analysis completed successfully",
            AnalyzeTextResponse { result, analysis_id },
        )),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub texts: Vec<String>,
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub save: bool,
    #[serde(default)]
    pub generate_insights: bool,
}

/// POST /api/analysis/batch
///
/// **Request:** `{"texts": [...], "title"?, "save"?, "generateInsights"?}`
/// **Response:** `{results, statistics, aiInsights?, analysisId?}`
///
/// **Errors:**
/// - 400 Bad Request: no usable texts, or more than 100
pub async fn analyze_batch(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<BatchRequest>,
) -> ApiResult<Json<ApiResponse<AnalysisOutcome>>> {
    let scored = score_texts(
        &state.sentiment,
        &state.ai,
        &request.texts,
        false,
        state.config.deep_group_delay,
    )
    .await?;

    let ai_insights = optional_insights(&state.ai, &scored, request.generate_insights).await;

    let analysis_id = if request.save {
        let mut analysis = NewAnalysis::new(
            &user.id,
            title_or(request.title.as_deref(), || {
                format!("Batch analysis ({} texts)", scored.results.len())
            }),
            InputType::Batch,
        );
        analysis.ai_insights = ai_insights.clone();
        Some(persist(&state, &analysis, &scored.results).await?)
    } else {
        None
    };

    let message = format!("Analyzed {} texts", scored.results.len());
    Ok(Json(ApiResponse::ok(
        message,
        AnalysisOutcome {
            scored,
            ai_insights,
            analysis_id,
            file_url: None,
        },
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepRequest {
    pub text: Option<String>,
    pub texts: Option<Vec<String>>,
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub save: bool,
    #[serde(default)]
    pub generate_insights: bool,
}

/// POST /api/analysis/deep
///
/// **Request:** `{"texts": [...]}` or `{"text": "..."}`, plus `title`, `save`,
/// `generateInsights`
/// **Response:** `{results, statistics, deepResults, aiInsights?, analysisId?}`
///
/// **Errors:**
/// - 400 Bad Request: no usable texts, or more than 100
/// - 503 Service Unavailable: no language model configured
pub async fn analyze_deep(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<DeepRequest>,
) -> ApiResult<Json<ApiResponse<AnalysisOutcome>>> {
    let texts: Vec<String> = request
        .texts
        .unwrap_or_default()
        .into_iter()
        .chain(request.text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if texts.is_empty() {
        return Err(ApiError::bad_request("Text array cannot be empty"));
    }

    let scored = score_texts(
        &state.sentiment,
        &state.ai,
        &texts,
        true,
        state.config.deep_group_delay,
    )
    .await?;

    let ai_insights = optional_insights(&state.ai, &scored, request.generate_insights).await;

    let analysis_id = if request.save {
        let mut analysis = NewAnalysis::new(
            &user.id,
            title_or(request.title.as_deref(), || {
                format!("Deep analysis ({} texts)", scored.results.len())
            }),
            InputType::Deep,
        );
        analysis.ai_insights = ai_insights.clone();
        Some(persist(&state, &analysis, &scored.results).await?)
    } else {
        None
    };

    Ok(Json(ApiResponse::ok(
        "Deep analysis completed successfully",
        AnalysisOutcome {
            scored,
            ai_insights,
            analysis_id,
            file_url: None,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    #[serde(default)]
    pub text: String,
    /// Known verdict; the text is classified first when absent
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub text: String,
    pub sentiment: Sentiment,
    pub explanation: String,
}

/// POST /api/analysis/explain
///
/// **Request:** `{"text", "sentiment"?: {"label", "score"}}`
/// **Response:** `{text, sentiment, explanation}`
///
/// **Errors:**
/// - 400 Bad Request: empty text
/// - 503 Service Unavailable: no language model configured
pub async fn explain(
    State(state): State<AppState>,
    _user: AuthUser,
    JsonBody(request): JsonBody<ExplainRequest>,
) -> ApiResult<Json<ApiResponse<ExplainResponse>>> {
    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_request("Text cannot be empty"));
    }
    if !state.ai.is_available() {
        return Err(ApiError::ai_unavailable());
    }

    let sentiment = match request.sentiment {
        Some(sentiment) => sentiment,
        None => state.sentiment.analyze_single(&text).await?.sentiment,
    };

    let explanation = state
        .ai
        .explain_sentiment(&text, sentiment.label, sentiment.score)
        .await?;

    Ok(Json(ApiResponse::ok(
        "Explanation generated successfully",
        ExplainResponse {
            text,
            sentiment,
            explanation,
        },
    )))
}

/// GET /api/analysis/history?page=&limit=
///
/// **Response:** `{data: [analysis...], pagination: {page, limit, total, totalPages}}`,
/// newest first
pub async fn get_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ApiResponse<Paginated<Analysis>>>> {
    let total = analyses::count_analyses(&state.db, &user.id).await?;
    let pagination = calculate_pagination(total, &query);
    let data =
        analyses::list_analyses(&state.db, &user.id, pagination.limit, pagination.offset()).await?;

    Ok(Json(ApiResponse::ok(
        "History retrieved successfully",
        Paginated { data, pagination },
    )))
}

/// GET /api/analysis/history/:id
///
/// **Errors:**
/// - 404 Not Found: no such analysis for this user
pub async fn get_analysis(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<AnalysisWithItems>>> {
    let analysis = analyses::get_analysis(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Analysis not found"))?;

    Ok(Json(ApiResponse::ok("Analysis retrieved successfully", analysis)))
}

/// DELETE /api/analysis/history/:id
///
/// Items and chat messages cascade. A stored upload is removed best-effort.
///
/// **Errors:**
/// - 404 Not Found: nothing deleted (absent, foreign, or already deleted)
pub async fn delete_analysis(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let file_path = analyses::delete_analysis(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Analysis not found"))?;

    if let Some(path) = file_path {
        if let Err(e) = state.storage.delete(&path).await {
            tracing::warn!(analysis_id = %id, path = %path, "Failed to remove stored file: {}", e);
        }
    }

    Ok(Json(ApiResponse::message("Analysis deleted successfully")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriod {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    #[serde(flatten)]
    pub totals: ReportTotals,
    pub period: ReportPeriod,
}

/// GET /api/analysis/reports?startDate=&endDate=
///
/// Dates are RFC 3339 or `YYYY-MM-DD`; a bare end date covers the whole day.
///
/// **Errors:**
/// - 400 Bad Request: unparseable date
pub async fn get_reports(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<ApiResponse<ReportResponse>>> {
    let start_date = query.start_date.filter(|s| !s.trim().is_empty());
    let end_date = query.end_date.filter(|s| !s.trim().is_empty());

    let start = match &start_date {
        Some(value) => Some(
            parse_boundary(value, false)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid startDate: {}", value)))?,
        ),
        None => None,
    };
    let end = match &end_date {
        Some(value) => Some(
            parse_boundary(value, true)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid endDate: {}", value)))?,
        ),
        None => None,
    };

    let totals = analyses::report_totals(&state.db, &user.id, start, end).await?;

    Ok(Json(ApiResponse::ok(
        "Reports retrieved successfully",
        ReportResponse {
            totals,
            period: ReportPeriod {
                start_date,
                end_date,
            },
        },
    )))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis/analyze", post(analyze_text))
        .route("/api/analysis/batch", post(analyze_batch))
        .route("/api/analysis/deep", post(analyze_deep))
        .route("/api/analysis/explain", post(explain))
        .route("/api/analysis/history", get(get_history))
        .route("/api/analysis/history/:id", get(get_analysis).delete(delete_analysis))
        .route("/api/analysis/reports", get(get_reports))
}
