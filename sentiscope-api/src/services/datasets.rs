//! HuggingFace datasets-server access
//!
//! Pulls labelled review rows from `/rows` and metadata from `/info`, maps
//! them to [`DatasetItem`]s and compares dataset labels against the
//! classifier's verdicts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::sentiment::{Sentiment, TextAnalysisResult};
use crate::error::ApiError;
use sentiscope_common::SentimentLabel;

pub const TOKOPEDIA_DATASET: &str = "farhamu/tokopedia-product-reviews-2019";
pub const DEFAULT_CONFIG: &str = "default";
pub const DEFAULT_SPLIT: &str = "train";

/// Rows per datasets-server request
pub const ROWS_PAGE_SIZE: usize = 100;
/// Largest `limit` a client may ask for
pub const MAX_FETCH_LIMIT: usize = 500;

const ROWS_TIMEOUT: Duration = Duration::from_secs(30);
const INFO_TIMEOUT: Duration = Duration::from_secs(10);

/// One review pulled from a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetItem {
    pub text: String,
    /// Rating or label exactly as the dataset stores it
    pub original_label: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

/// Raw access to a datasets-server deployment
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// `row` objects of one page
    async fn fetch_rows(
        &self,
        dataset: &str,
        config: &str,
        split: &str,
        offset: usize,
        length: usize,
    ) -> Result<Vec<Map<String, Value>>, ApiError>;

    async fn dataset_info(&self, dataset: &str) -> Result<Value, ApiError>;
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Option<Vec<RowEntry>>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    #[serde(default)]
    row: Map<String, Value>,
}

/// HTTP client for `datasets-server.huggingface.co`
pub struct DatasetsServerClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl DatasetsServerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DatasetSource for DatasetsServerClient {
    async fn fetch_rows(
        &self,
        dataset: &str,
        config: &str,
        split: &str,
        offset: usize,
        length: usize,
    ) -> Result<Vec<Map<String, Value>>, ApiError> {
        let offset = offset.to_string();
        let length = length.to_string();

        let response = self
            .http_client
            .get(format!("{}/rows", self.base_url))
            .query(&[
                ("dataset", dataset),
                ("config", config),
                ("split", split),
                ("offset", offset.as_str()),
                ("length", length.as_str()),
            ])
            .timeout(ROWS_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(dataset, "Dataset request failed: {}", e);
                ApiError::internal("Failed to fetch dataset from HuggingFace")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            return Err(ApiError::from_status_code(
                status.as_u16(),
                format!("HuggingFace API error: {}", message),
            ));
        }

        let parsed: RowsResponse = response.json().await.map_err(|e| {
            tracing::error!(dataset, "Malformed dataset response: {}", e);
            ApiError::internal("Invalid response from HuggingFace API")
        })?;

        let rows = parsed
            .rows
            .ok_or_else(|| ApiError::internal("Invalid response from HuggingFace API"))?;

        Ok(rows.into_iter().map(|entry| entry.row).collect())
    }

    async fn dataset_info(&self, dataset: &str) -> Result<Value, ApiError> {
        let response = self
            .http_client
            .get(format!("{}/info", self.base_url))
            .query(&[("dataset", dataset)])
            .timeout(INFO_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::error!(dataset, "Dataset info request failed: {}", e);
                ApiError::internal("Failed to fetch dataset info")
            })?;

        response
            .json()
            .await
            .map_err(|_| ApiError::internal("Failed to fetch dataset info"))
    }
}

/// Paged dataset retrieval on top of a [`DatasetSource`]
#[derive(Clone)]
pub struct DatasetService {
    source: Arc<dyn DatasetSource>,
    page_delay: Duration,
}

impl DatasetService {
    pub fn new(source: Arc<dyn DatasetSource>, page_delay: Duration) -> Self {
        Self { source, page_delay }
    }

    /// Tokopedia product reviews, fetched in pages until `limit` rows were read
    /// or the dataset ran out
    pub async fn fetch_tokopedia_reviews(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DatasetItem>, ApiError> {
        let mut items = Vec::new();
        let mut remaining = limit;
        let mut current_offset = offset;

        while remaining > 0 {
            let page_size = remaining.min(ROWS_PAGE_SIZE);
            let rows = self
                .source
                .fetch_rows(TOKOPEDIA_DATASET, DEFAULT_CONFIG, DEFAULT_SPLIT, current_offset, page_size)
                .await?;

            let received = rows.len();
            items.extend(
                rows.iter()
                    .map(map_tokopedia_row)
                    .filter(|item| !item.text.trim().is_empty()),
            );

            tracing::debug!(fetched = items.len(), limit, "Fetched dataset page");

            if received < page_size {
                tracing::debug!("Reached end of dataset");
                break;
            }

            remaining -= page_size;
            current_offset += page_size;

            if remaining > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(items)
    }

    /// Any dataset with review-like rows, in a single request
    pub async fn fetch_dataset(
        &self,
        dataset: &str,
        config: &str,
        split: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DatasetItem>, ApiError> {
        let rows = self
            .source
            .fetch_rows(dataset, config, split, offset, limit)
            .await?;

        Ok(rows
            .iter()
            .map(map_generic_row)
            .filter(|item| !item.text.trim().is_empty())
            .collect())
    }

    pub async fn dataset_info(&self, dataset: &str) -> Result<Value, ApiError> {
        self.source.dataset_info(dataset).await
    }
}

/// First non-empty of `fields`, rendered as text
fn text_field(row: &Map<String, Value>, fields: &[&str]) -> String {
    fields
        .iter()
        .filter_map(|f| row.get(*f))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// A rating is usable when it is a non-zero number
fn rating(row: &Map<String, Value>) -> Option<Value> {
    row.get("rating")
        .filter(|v| v.as_f64().is_some_and(|r| r != 0.0))
        .cloned()
}

/// Star rating to label: 1-2 negative, 3 neutral, 4-5 positive
pub fn sentiment_from_rating(rating: f64) -> Option<SentimentLabel> {
    if rating <= 2.0 {
        Some(SentimentLabel::Negative)
    } else if rating == 3.0 {
        Some(SentimentLabel::Neutral)
    } else if rating >= 4.0 {
        Some(SentimentLabel::Positive)
    } else {
        None
    }
}

fn product_name(row: &Map<String, Value>) -> Option<String> {
    row.get("product_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn map_tokopedia_row(row: &Map<String, Value>) -> DatasetItem {
    let label = rating(row)
        .or_else(|| row.get("label").filter(|v| !v.is_null()).cloned())
        .unwrap_or(Value::from(0));

    let sentiment = match label.as_f64() {
        Some(r) => sentiment_from_rating(r).or(Some(SentimentLabel::Positive)),
        None => Some(SentimentLabel::Neutral),
    };

    DatasetItem {
        text: text_field(row, &["review", "text", "comment", "content"]),
        original_label: label,
        sentiment,
        product_name: product_name(row),
    }
}

pub fn map_generic_row(row: &Map<String, Value>) -> DatasetItem {
    let label = rating(row)
        .or_else(|| row.get("label").filter(|v| !v.is_null()).cloned())
        .or_else(|| {
            row.get("sentiment")
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .cloned()
        })
        .unwrap_or_else(|| Value::from("unknown"));

    let sentiment = match &label {
        Value::Number(n) => n.as_f64().and_then(sentiment_from_rating),
        Value::String(s) => {
            let lower = s.to_lowercase();
            if lower.contains("positive") {
                Some(SentimentLabel::Positive)
            } else if lower.contains("negative") {
                Some(SentimentLabel::Negative)
            } else if lower.contains("neutral") {
                Some(SentimentLabel::Neutral)
            } else {
                None
            }
        }
        _ => None,
    };

    DatasetItem {
        text: text_field(row, &["review", "text", "comment", "content", "sentence"]),
        original_label: label,
        sentiment,
        product_name: product_name(row),
    }
}

/// Items whose text or product name contains any keyword, case-insensitively
pub fn filter_by_keywords(items: Vec<DatasetItem>, keywords: &[String]) -> Vec<DatasetItem> {
    let wanted: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    if wanted.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            let text = item.text.to_lowercase();
            let product = item.product_name.as_deref().unwrap_or_default().to_lowercase();
            wanted
                .iter()
                .any(|k| text.contains(k.as_str()) || product.contains(k.as_str()))
        })
        .collect()
}

/// Dataset label against classifier verdict for one text
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelComparison {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub original_label: Value,
    pub predicted_sentiment: Sentiment,
    #[serde(rename = "match")]
    pub matches: bool,
}

/// Pair items with their results and compute the share that agree, in percent
pub fn compare_labels(
    items: &[DatasetItem],
    results: &[TextAnalysisResult],
) -> (Vec<LabelComparison>, f64) {
    let comparison: Vec<LabelComparison> = items
        .iter()
        .zip(results)
        .map(|(item, result)| LabelComparison {
            text: item.text.clone(),
            product_name: item.product_name.clone(),
            original_label: item
                .sentiment
                .map(|s| Value::from(s.as_str()))
                .unwrap_or_else(|| item.original_label.clone()),
            predicted_sentiment: result.sentiment,
            matches: item.sentiment == Some(result.sentiment.label),
        })
        .collect();

    let accuracy = if comparison.is_empty() {
        0.0
    } else {
        comparison.iter().filter(|c| c.matches).count() as f64 / comparison.len() as f64 * 100.0
    };

    (comparison, accuracy)
}
