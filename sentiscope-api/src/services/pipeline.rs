//! Shared scoring steps for the text, batch, CSV, image and dataset flows

use serde::Serialize;
use std::time::Duration;

use super::ai::AiService;
use super::deep_analysis::{batch_deep_analysis, DeepAnalysisResult};
use super::sentiment::{
    statistics, CommentMetadata, Sentiment, SentimentService, SentimentStatistics,
    TextAnalysisResult,
};
use crate::error::ApiError;

/// Scored texts plus the optional deep verdicts behind them
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTexts {
    pub results: Vec<TextAnalysisResult>,
    pub statistics: SentimentStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_results: Option<Vec<DeepAnalysisResult>>,
}

impl From<DeepAnalysisResult> for TextAnalysisResult {
    fn from(deep: DeepAnalysisResult) -> Self {
        TextAnalysisResult {
            text: deep.text,
            sentiment: Sentiment {
                label: deep.analysis.sentiment,
                score: deep.analysis.score,
            },
            keywords: deep.analysis.key_phrases,
            metadata: None,
        }
    }
}

/// Score with the classifier, or with the language model when `deep` is set
pub async fn score_texts(
    sentiment: &SentimentService,
    ai: &AiService,
    texts: &[String],
    deep: bool,
    deep_group_delay: Duration,
) -> Result<ScoredTexts, ApiError> {
    let (results, deep_results) = if deep {
        let deep_results = batch_deep_analysis(ai, texts, deep_group_delay).await?;
        let results = deep_results
            .iter()
            .cloned()
            .map(TextAnalysisResult::from)
            .collect();
        (results, Some(deep_results))
    } else {
        (sentiment.analyze_batch(texts).await?, None)
    };

    Ok(ScoredTexts {
        statistics: statistics(&results),
        results,
        deep_results,
    })
}

/// Attach comment metadata by position
///
/// `metadata[i]` describes the text scored into `results[i]`; comment texts
/// are never blank, so scoring keeps them one-to-one.
pub fn attach_metadata(results: &mut [TextAnalysisResult], metadata: &[CommentMetadata]) {
    for (result, meta) in results.iter_mut().zip(metadata) {
        result.metadata = Some(meta.clone());
    }
}

/// Insights when requested and the language model is configured
///
/// Failures are logged and yield `None`; insights never fail an analysis.
pub async fn optional_insights(ai: &AiService, scored: &ScoredTexts, wanted: bool) -> Option<String> {
    if !wanted || !ai.is_available() {
        return None;
    }

    match ai.generate_insights(&scored.statistics, &scored.results).await {
        Ok(insights) => Some(insights),
        Err(e) => {
            tracing::warn!(error = %e.message, "Failed to generate insights");
            None
        }
    }
}
