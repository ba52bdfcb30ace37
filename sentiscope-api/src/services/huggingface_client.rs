//! HuggingFace Inference API client
//!
//! Posts `{"inputs": text}` to a text-classification model and keeps the
//! highest-scoring label. Outbound calls are paced by a shared rate limiter
//! so sequential batches do not trip the provider's limits.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovernorLimiter};
use std::sync::Arc;
use std::time::Duration;

use super::sentiment::{Sentiment, SentimentClassifier};
use crate::error::ApiError;
use sentiscope_common::SentimentLabel;

const USER_AGENT: &str = concat!("SentiScope/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One `{label, score}` entry of a classification response
#[derive(Debug, Clone, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// The model answers `[[{label, score}, ...]]`; some deployments drop the
/// outer array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassificationResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            ClassificationResponse::Nested(mut outer) => {
                if outer.is_empty() {
                    Vec::new()
                } else {
                    outer.swap_remove(0)
                }
            }
            ClassificationResponse::Flat(scores) => scores,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Paces outbound requests to at most one per `min_interval`
///
/// A zero interval disables pacing.
pub struct RateLimiter {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(min_interval).map(GovernorLimiter::direct),
        }
    }

    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

/// Pick the top-scoring entry and map it onto a sentiment
///
/// Labels that match none of the known names degrade to neutral.
pub fn top_sentiment(scores: &[LabelScore]) -> Option<Sentiment> {
    let top = scores
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))?;

    let label = SentimentLabel::from_model_label(&top.label).unwrap_or_else(|| {
        tracing::warn!(label = %top.label, "Unknown sentiment label, mapping to neutral");
        SentimentLabel::Neutral
    });

    Some(Sentiment {
        label,
        score: top.score,
    })
}

/// HuggingFace text-classification client
pub struct HuggingFaceClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    model_url: String,
    api_key: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(
        model_url: String,
        api_key: Option<String>,
        min_interval: Duration,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(min_interval)),
            model_url,
            api_key,
        })
    }
}

#[async_trait]
impl SentimentClassifier for HuggingFaceClient {
    async fn classify(&self, text: &str) -> Result<Sentiment, ApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::internal("HuggingFace API key is not configured"))?;

        self.rate_limiter.wait().await;

        tracing::debug!(chars = text.len(), "Querying HuggingFace classifier");

        let response = self
            .http_client
            .post(&self.model_url)
            .bearer_auth(api_key)
            .json(&json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::request_timeout("Request timeout - text may be too long")
                } else {
                    tracing::error!("HuggingFace request failed: {}", e);
                    ApiError::internal("Failed to analyze sentiment")
                }
            })?;

        let status = response.status();

        if status.as_u16() == 401 {
            return Err(ApiError::internal("Invalid HuggingFace API key"));
        }

        if status.as_u16() == 503 {
            return Err(ApiError::service_unavailable(
                "Model is loading, please try again in a moment",
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "HuggingFace API error".to_string());
            tracing::warn!(status = status.as_u16(), %message, "HuggingFace API error");
            return Err(ApiError::from_status_code(
                status.as_u16(),
                format!("HuggingFace API error: {}", message),
            ));
        }

        let parsed: ClassificationResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::request_timeout("Request timeout - text may be too long")
            } else {
                ApiError::internal(format!("Failed to parse HuggingFace response: {}", e))
            }
        })?;

        top_sentiment(&parsed.into_scores())
            .ok_or_else(|| ApiError::internal("No sentiment results returned from API"))
    }
}
