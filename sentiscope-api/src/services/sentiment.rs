//! Sentiment request pipeline
//!
//! Validates texts, sends them one at a time to the classifier, attaches
//! keywords and computes summary statistics. A failing item in a batch is
//! recorded with the `error` label and never aborts the batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::keywords::extract_keywords;
use crate::error::ApiError;
use sentiscope_common::SentimentLabel;

/// Largest number of texts accepted by one batch request
pub const MAX_BATCH_SIZE: usize = 100;

/// Label plus confidence for one text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

impl Sentiment {
    /// Sentinel for an item whose classification failed
    pub fn failed() -> Self {
        Self {
            label: SentimentLabel::Error,
            score: 0.0,
        }
    }
}

/// External text classifier
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment, ApiError>;
}

/// Author and time of a comment recovered from a screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentMetadata {
    pub username: String,
    pub timestamp: String,
}

/// Result for one analysed text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysisResult {
    pub text: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CommentMetadata>,
}

/// Summary counts over a set of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentStatistics {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub error: usize,
    pub positive_percentage: f64,
    pub negative_percentage: f64,
    pub neutral_percentage: f64,
    pub average_score: f64,
}

/// Classifier-backed analysis of single texts and batches
#[derive(Clone)]
pub struct SentimentService {
    classifier: Arc<dyn SentimentClassifier>,
}

impl SentimentService {
    pub fn new(classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self { classifier }
    }

    pub async fn analyze_single(&self, text: &str) -> Result<TextAnalysisResult, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::bad_request("Text cannot be empty"));
        }

        let sentiment = self.classifier.classify(text).await?;

        Ok(TextAnalysisResult {
            text: text.to_string(),
            sentiment,
            keywords: extract_keywords(text),
            metadata: None,
        })
    }

    /// Classify texts sequentially
    ///
    /// Whitespace-only entries are dropped first, so the result can be
    /// shorter than the input; every surviving text yields exactly one result
    /// in input order.
    pub async fn analyze_batch(&self, texts: &[String]) -> Result<Vec<TextAnalysisResult>, ApiError> {
        if texts.is_empty() {
            return Err(ApiError::bad_request("Text array cannot be empty"));
        }

        if texts.len() > MAX_BATCH_SIZE {
            return Err(ApiError::bad_request(format!(
                "Maximum {} texts per batch",
                MAX_BATCH_SIZE
            )));
        }

        let valid: Vec<&String> = texts.iter().filter(|t| !t.trim().is_empty()).collect();
        if valid.is_empty() {
            return Err(ApiError::bad_request("No valid texts to analyze"));
        }

        tracing::info!(count = valid.len(), "Analyzing batch");

        let mut results = Vec::with_capacity(valid.len());
        for text in valid {
            match self.analyze_single(text).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(status = %e.status, error = %e.message, "Batch item failed");
                    results.push(TextAnalysisResult {
                        text: text.clone(),
                        sentiment: Sentiment::failed(),
                        keywords: Vec::new(),
                        metadata: None,
                    });
                }
            }
        }

        Ok(results)
    }
}

/// Counts, percentages over non-error results, and mean score over all results
pub fn statistics(results: &[TextAnalysisResult]) -> SentimentStatistics {
    let count = |label: SentimentLabel| results.iter().filter(|r| r.sentiment.label == label).count();

    let total = results.len();
    let positive = count(SentimentLabel::Positive);
    let negative = count(SentimentLabel::Negative);
    let neutral = count(SentimentLabel::Neutral);
    let error = count(SentimentLabel::Error);

    let valid = total - error;
    let percentage = |n: usize| {
        if valid > 0 {
            n as f64 / valid as f64 * 100.0
        } else {
            0.0
        }
    };

    let average_score = if total > 0 {
        results.iter().map(|r| r.sentiment.score).sum::<f64>() / total as f64
    } else {
        0.0
    };

    SentimentStatistics {
        total,
        positive,
        negative,
        neutral,
        error,
        positive_percentage: percentage(positive),
        negative_percentage: percentage(negative),
        neutral_percentage: percentage(neutral),
        average_score,
    }
}
