//! Group-concurrent deep analysis of many texts
//!
//! Texts are processed in groups of [`DEEP_GROUP_SIZE`]. Every call in a group
//! runs concurrently and settles on its own: a failed call is replaced by
//! [`DeepAnalysis::failed`] without touching its neighbours. A fixed delay
//! separates groups to stay under provider rate limits.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ai::{AiService, DeepAnalysis};
use super::sentiment::MAX_BATCH_SIZE;
use crate::error::ApiError;

/// Concurrent calls per group
pub const DEEP_GROUP_SIZE: usize = 10;

/// Deep verdict for one input text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepAnalysisResult {
    pub text: String,
    #[serde(flatten)]
    pub analysis: DeepAnalysis,
}

/// Analyse `texts` in order; the output has the same length and order
pub async fn batch_deep_analysis(
    ai: &AiService,
    texts: &[String],
    group_delay: Duration,
) -> Result<Vec<DeepAnalysisResult>, ApiError> {
    if !ai.is_available() {
        return Err(ApiError::ai_unavailable());
    }

    if texts.is_empty() {
        return Err(ApiError::bad_request("Text array cannot be empty"));
    }

    if texts.len() > MAX_BATCH_SIZE {
        return Err(ApiError::bad_request(format!(
            "Maximum {} texts per batch",
            MAX_BATCH_SIZE
        )));
    }

    tracing::info!(count = texts.len(), "Starting batch deep analysis");

    let mut results = Vec::with_capacity(texts.len());
    let group_count = texts.len().div_ceil(DEEP_GROUP_SIZE);

    for (index, group) in texts.chunks(DEEP_GROUP_SIZE).enumerate() {
        if index > 0 && !group_delay.is_zero() {
            tokio::time::sleep(group_delay).await;
        }

        let settled = join_all(group.iter().map(|text| ai.deep_analysis(text))).await;

        let mut failures = 0;
        for (text, outcome) in group.iter().zip(settled) {
            let analysis = outcome.unwrap_or_else(|e| {
                failures += 1;
                tracing::warn!(error = %e.message, "Deep analysis failed for one text");
                DeepAnalysis::failed()
            });
            results.push(DeepAnalysisResult {
                text: text.clone(),
                analysis,
            });
        }

        tracing::debug!(
            group = index + 1,
            of = group_count,
            failures,
            "Deep analysis group settled"
        );
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::openai_client::{CompletionRequest, LanguageModel};
    use async_trait::async_trait;
    use sentiscope_common::SentimentLabel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Positive verdict for every text except ones containing "fail"
    struct FlakyModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for FlakyModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.messages[0].content.contains("text-fail") {
                return Err(ApiError::internal("OpenAI API error: boom"));
            }
            Ok(r#"{"sentiment":"positive","score":0.9,"explanation":"ok","keyPhrases":[]}"#.to_string())
        }
    }

    fn texts(n: usize, failing: Option<usize>) -> Vec<String> {
        (0..n)
            .map(|i| {
                if Some(i) == failing {
                    "text-fail".to_string()
                } else {
                    format!("text-{}", i)
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_one_failure_does_not_poison_group() {
        let model = Arc::new(FlakyModel {
            calls: AtomicUsize::new(0),
        });
        let ai = AiService::new(Some(model.clone()));

        let input = texts(23, Some(14));
        let results = batch_deep_analysis(&ai, &input, Duration::ZERO).await.unwrap();

        assert_eq!(results.len(), 23);
        assert_eq!(model.calls.load(Ordering::SeqCst), 23);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.text, input[i]);
            if i == 14 {
                assert_eq!(result.analysis, DeepAnalysis::failed());
            } else {
                assert_eq!(result.analysis.sentiment, SentimentLabel::Positive);
            }
        }
    }

    #[tokio::test]
    async fn test_requires_model() {
        let ai = AiService::new(None);
        let err = batch_deep_analysis(&ai, &texts(2, None), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 503);
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let model = Arc::new(FlakyModel {
            calls: AtomicUsize::new(0),
        });
        let ai = AiService::new(Some(model.clone()));
        let err = batch_deep_analysis(&ai, &texts(101, None), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_result_serializes_flat() {
        let result = DeepAnalysisResult {
            text: "t".into(),
            analysis: DeepAnalysis::failed(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["text"], "t");
        assert_eq!(json["explanation"], "Analysis failed");
        assert!(json["keyPhrases"].as_array().unwrap().is_empty());
    }
}
