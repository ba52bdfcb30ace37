//! Public dataset endpoints
//!
//! Rows come from the HuggingFace datasets-server. The Tokopedia analysis
//! endpoint scores reviews and compares the verdicts with the star ratings.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use sentiscope_common::api::ApiResponse;
use sentiscope_common::db::InputType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analysis::persist;
use super::extract::{AuthUser, JsonBody};
use crate::db::analyses::NewAnalysis;
use crate::services::datasets::{
    compare_labels, filter_by_keywords, DatasetItem, LabelComparison, DEFAULT_CONFIG, DEFAULT_SPLIT,
    MAX_FETCH_LIMIT,
};
use crate::services::pipeline::score_texts;
use crate::services::sentiment::{SentimentStatistics, TextAnalysisResult, MAX_BATCH_SIZE};
use crate::{ApiError, ApiResult, AppState};

/// Rows returned when the client gives no limit
const DEFAULT_FETCH_LIMIT: usize = 100;

const TOKOPEDIA_SOURCE: &str = "Tokopedia Product Reviews Dataset";

fn check_limit(limit: usize) -> ApiResult<usize> {
    if limit > MAX_FETCH_LIMIT {
        return Err(ApiError::bad_request(format!(
            "Maximum limit is {} items",
            MAX_FETCH_LIMIT
        )));
    }
    Ok(if limit == 0 { DEFAULT_FETCH_LIMIT } else { limit })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    pub items: Vec<DatasetItem>,
    pub count: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// GET /api/datasets/tokopedia-reviews?limit=&offset=
///
/// **Errors:**
/// - 400 Bad Request: limit above 500
pub async fn tokopedia_reviews(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ReviewsQuery>,
) -> ApiResult<Json<ApiResponse<DatasetPage>>> {
    let limit = check_limit(query.limit.unwrap_or(DEFAULT_FETCH_LIMIT))?;
    let offset = query.offset.unwrap_or(0);

    let items = state.datasets.fetch_tokopedia_reviews(limit, offset).await?;

    Ok(Json(ApiResponse::ok(
        format!("Fetched {} items from Tokopedia reviews dataset", items.len()),
        DatasetPage {
            dataset_name: None,
            count: items.len(),
            items,
            offset,
            limit,
        },
    )))
}

/// `"keywords"` given as one string or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl Keywords {
    pub fn into_vec(self) -> Vec<String> {
        let all = match self {
            Keywords::One(k) => vec![k],
            Keywords::Many(ks) => ks,
        };
        all.into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeReviewsRequest {
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    pub keywords: Option<Keywords>,
    #[serde(default)]
    pub save: bool,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetResult {
    #[serde(flatten)]
    pub result: TextAnalysisResult,
    pub product_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAnalysisResponse {
    pub results: Vec<DatasetResult>,
    pub statistics: SentimentStatistics,
    pub comparison: Vec<LabelComparison>,
    /// Share of matching labels, e.g. `"83.00%"`
    pub accuracy: String,
    pub source: String,
    pub keywords: Option<Vec<String>>,
    pub total_fetched: usize,
    pub filtered_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
}

/// Filtered reviews cut down to what one batch may score
fn select_reviews(
    items: Vec<DatasetItem>,
    keywords: &[String],
    limit: Option<usize>,
) -> ApiResult<Vec<DatasetItem>> {
    let mut selected = filter_by_keywords(items, keywords);

    if selected.is_empty() {
        return Err(ApiError::not_found(format!(
            "No reviews found containing keywords: {}",
            keywords.join(", ")
        )));
    }

    match limit {
        Some(limit) => selected.truncate(limit),
        None if selected.len() > MAX_BATCH_SIZE => {
            tracing::warn!(found = selected.len(), kept = MAX_BATCH_SIZE, "Capping dataset reviews to one batch");
            selected.truncate(MAX_BATCH_SIZE);
        }
        None => {}
    }

    if selected.len() > MAX_BATCH_SIZE {
        return Err(ApiError::bad_request(format!(
            "Maximum {} texts can be analyzed per request",
            MAX_BATCH_SIZE
        )));
    }

    Ok(selected)
}

/// POST /api/datasets/tokopedia-reviews/analyze
///
/// **Request:** `{"limit"?, "offset"?, "keywords"?: string | [string], "save"?, "title"?}`
/// **Response:** `{results, statistics, comparison, accuracy, source, keywords,
/// totalFetched, filteredCount, analysisId?}`
///
/// With keywords the full fetch window is searched before the limit applies.
///
/// **Errors:**
/// - 400 Bad Request: limit above 500, or more than 100 reviews selected
/// - 404 Not Found: empty dataset page or no keyword match
pub async fn analyze_tokopedia_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<AnalyzeReviewsRequest>,
) -> ApiResult<Json<ApiResponse<ReviewAnalysisResponse>>> {
    let keywords = request.keywords.map(Keywords::into_vec).unwrap_or_default();
    let limit = request.limit.filter(|l| *l > 0);

    let fetch_limit = if keywords.is_empty() {
        check_limit(limit.unwrap_or(MAX_BATCH_SIZE))?
    } else {
        if let Some(limit) = limit {
            check_limit(limit)?;
        }
        MAX_FETCH_LIMIT
    };

    let items = state
        .datasets
        .fetch_tokopedia_reviews(fetch_limit, request.offset)
        .await?;
    if items.is_empty() {
        return Err(ApiError::not_found("No data found in dataset"));
    }
    let total_fetched = items.len();

    let selected = select_reviews(items, &keywords, limit)?;
    tracing::info!(
        fetched = total_fetched,
        selected = selected.len(),
        keywords = ?keywords,
        "Analyzing dataset reviews"
    );

    let texts: Vec<String> = selected.iter().map(|item| item.text.clone()).collect();
    let scored = score_texts(
        &state.sentiment,
        &state.ai,
        &texts,
        false,
        state.config.deep_group_delay,
    )
    .await?;

    let (comparison, accuracy) = compare_labels(&selected, &scored.results);

    let analysis_id = if request.save {
        let input_type = if keywords.is_empty() {
            InputType::Dataset
        } else {
            InputType::Keywords
        };
        let title = super::analysis::title_or(request.title.as_deref(), || {
            if keywords.is_empty() {
                "Tokopedia reviews".to_string()
            } else {
                format!("Tokopedia reviews: {}", keywords.join(", "))
            }
        });
        let analysis = NewAnalysis::new(&user.id, title, input_type);
        Some(persist(&state, &analysis, &scored.results).await?)
    } else {
        None
    };

    let message = if keywords.is_empty() {
        format!("Analyzed {} Tokopedia reviews", scored.results.len())
    } else {
        format!(
            "Analyzed {} Tokopedia reviews containing keywords: {}",
            scored.results.len(),
            keywords.join(", ")
        )
    };

    let filtered_count = selected.len();
    let results = scored
        .results
        .into_iter()
        .zip(selected)
        .map(|(result, item)| DatasetResult {
            result,
            product_name: item.product_name,
        })
        .collect();

    Ok(Json(ApiResponse::ok(
        message,
        ReviewAnalysisResponse {
            results,
            statistics: scored.statistics,
            comparison,
            accuracy: format!("{:.2}%", accuracy),
            source: TOKOPEDIA_SOURCE.to_string(),
            keywords: (!keywords.is_empty()).then_some(keywords),
            total_fetched,
            filtered_count,
            analysis_id,
        },
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchDatasetRequest {
    #[serde(default)]
    pub dataset_name: String,
    pub config: Option<String>,
    pub split: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

/// POST /api/datasets/fetch
///
/// **Request:** `{"datasetName", "config"?, "split"?, "limit"?, "offset"?}`
///
/// **Errors:**
/// - 400 Bad Request: missing dataset name, limit above 500
pub async fn fetch_dataset(
    State(state): State<AppState>,
    _user: AuthUser,
    JsonBody(request): JsonBody<FetchDatasetRequest>,
) -> ApiResult<Json<ApiResponse<DatasetPage>>> {
    let dataset_name = request.dataset_name.trim().to_string();
    if dataset_name.is_empty() {
        return Err(ApiError::bad_request("Dataset name is required"));
    }
    let limit = check_limit(request.limit.unwrap_or(DEFAULT_FETCH_LIMIT))?;

    let items = state
        .datasets
        .fetch_dataset(
            &dataset_name,
            request.config.as_deref().unwrap_or(DEFAULT_CONFIG),
            request.split.as_deref().unwrap_or(DEFAULT_SPLIT),
            limit,
            request.offset,
        )
        .await?;

    Ok(Json(ApiResponse::ok(
        format!("Fetched {} items from {}", items.len(), dataset_name),
        DatasetPage {
            count: items.len(),
            dataset_name: Some(dataset_name),
            items,
            offset: request.offset,
            limit,
        },
    )))
}

/// GET /api/datasets/info/*dataset_name
///
/// Dataset names contain a slash (`owner/name`), so the rest of the path is
/// captured.
pub async fn dataset_info(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(dataset_name): Path<String>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let dataset_name = dataset_name.trim_matches('/');
    if dataset_name.is_empty() {
        return Err(ApiError::bad_request("Dataset name is required"));
    }

    let info = state.datasets.dataset_info(dataset_name).await?;
    Ok(Json(ApiResponse::ok("Dataset info retrieved successfully", info)))
}

/// Build dataset routes
pub fn dataset_routes() -> Router<AppState> {
    Router::new()
        .route("/api/datasets/tokopedia-reviews", get(tokopedia_reviews))
        .route("/api/datasets/tokopedia-reviews/analyze", post(analyze_tokopedia_reviews))
        .route("/api/datasets/fetch", post(fetch_dataset))
        .route("/api/datasets/info/*dataset_name", get(dataset_info))
}
