//! Analysis persistence
//!
//! An analysis and its items are written in one transaction. Aggregate
//! counts are computed from the items at write time and never recomputed.

use chrono::{DateTime, Utc};
use sentiscope_common::db::{Analysis, AnalysisItem, AnalysisWithItems, InputType};
use sentiscope_common::time::{format_timestamp, now_rfc3339};
use sentiscope_common::{Error, Result, SentimentLabel};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::services::sentiment::TextAnalysisResult;

const ANALYSIS_COLUMNS: &str = "id, user_id, title, input_type, total_items, positive_count, \
     negative_count, neutral_count, average_score, file_path, file_url, ai_insights, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, analysis_id, position, text_content, sentiment_label, confidence_score, keywords, created_at";

/// Analysis-level fields supplied by the caller
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub user_id: String,
    pub title: String,
    pub input_type: InputType,
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub ai_insights: Option<String>,
}

impl NewAnalysis {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, input_type: InputType) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            input_type,
            file_path: None,
            file_url: None,
            ai_insights: None,
        }
    }
}

/// Counts and mean score over a result set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregates {
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub average_score: f64,
}

pub fn aggregate(results: &[TextAnalysisResult]) -> Aggregates {
    let count = |label| results.iter().filter(|r| r.sentiment.label == label).count() as i64;
    let total = results.len() as i64;
    let average_score = if total > 0 {
        results.iter().map(|r| r.sentiment.score).sum::<f64>() / total as f64
    } else {
        0.0
    };

    Aggregates {
        total,
        positive: count(SentimentLabel::Positive),
        negative: count(SentimentLabel::Negative),
        neutral: count(SentimentLabel::Neutral),
        average_score,
    }
}

/// Insert the analysis and all of its items atomically
pub async fn save_analysis(
    pool: &SqlitePool,
    analysis: &NewAnalysis,
    results: &[TextAnalysisResult],
) -> Result<AnalysisWithItems> {
    if results.is_empty() {
        return Err(Error::InvalidInput(
            "Cannot save an analysis without items".to_string(),
        ));
    }

    let totals = aggregate(results);
    let analysis_id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO analyses (id, user_id, title, input_type, total_items, positive_count,
                              negative_count, neutral_count, average_score, file_path, file_url,
                              ai_insights, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&analysis_id)
    .bind(&analysis.user_id)
    .bind(&analysis.title)
    .bind(analysis.input_type)
    .bind(totals.total)
    .bind(totals.positive)
    .bind(totals.negative)
    .bind(totals.neutral)
    .bind(totals.average_score)
    .bind(&analysis.file_path)
    .bind(&analysis.file_url)
    .bind(&analysis.ai_insights)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for (position, result) in results.iter().enumerate() {
        let keywords = serde_json::to_string(&result.keywords)
            .map_err(|e| Error::Internal(format!("Failed to encode keywords: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO analysis_items (id, analysis_id, position, text_content, sentiment_label,
                                        confidence_score, keywords, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&analysis_id)
        .bind(position as i64)
        .bind(&result.text)
        .bind(result.sentiment.label)
        .bind(result.sentiment.score)
        .bind(keywords)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        analysis_id = %analysis_id,
        input_type = %analysis.input_type,
        items = totals.total,
        "Saved analysis"
    );

    get_analysis(pool, &analysis_id, &analysis.user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Analysis {} vanished after commit", analysis_id)))
}

/// Newest first
pub async fn list_analyses(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Analysis>> {
    let analyses = sqlx::query_as::<_, Analysis>(&format!(
        "SELECT {} FROM analyses WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        ANALYSIS_COLUMNS
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(analyses)
}

pub async fn count_analyses(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM analyses WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// The analysis with its items in insertion order; `None` if absent or owned by someone else
pub async fn get_analysis(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<AnalysisWithItems>> {
    let analysis = sqlx::query_as::<_, Analysis>(&format!(
        "SELECT {} FROM analyses WHERE id = ? AND user_id = ?",
        ANALYSIS_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(analysis) = analysis else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, AnalysisItem>(&format!(
        "SELECT {} FROM analysis_items WHERE analysis_id = ? ORDER BY position ASC",
        ITEM_COLUMNS
    ))
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(AnalysisWithItems { analysis, items }))
}

/// Delete an owned analysis, returning its stored file path
///
/// `Ok(None)` means nothing was deleted. Items and chat messages cascade.
pub async fn delete_analysis(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
) -> Result<Option<Option<String>>> {
    let deleted: Option<Option<String>> = sqlx::query_scalar(
        "DELETE FROM analyses WHERE id = ? AND user_id = ? RETURNING file_path",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    if deleted.is_some() {
        info!(analysis_id = %id, "Deleted analysis");
    }

    Ok(deleted)
}

/// Totals across a user's analyses within an optional time window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub total_analyses: i64,
    pub total_items: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    /// Item-weighted mean of the analyses' average scores, two decimals
    pub average_score: f64,
}

pub async fn report_totals(
    pool: &SqlitePool,
    user_id: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<ReportTotals> {
    let (count, items, positive, negative, neutral, weighted): (i64, i64, i64, i64, i64, f64) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(total_items), 0),
                   COALESCE(SUM(positive_count), 0),
                   COALESCE(SUM(negative_count), 0),
                   COALESCE(SUM(neutral_count), 0),
                   COALESCE(SUM(average_score * total_items), 0.0)
            FROM analyses
            WHERE user_id = ?
              AND (? IS NULL OR created_at >= ?)
              AND (? IS NULL OR created_at <= ?)
            "#,
        )
        .bind(user_id)
        .bind(start.as_ref().map(format_timestamp))
        .bind(start.as_ref().map(format_timestamp))
        .bind(end.as_ref().map(format_timestamp))
        .bind(end.as_ref().map(format_timestamp))
        .fetch_one(pool)
        .await?;

    let average_score = if items > 0 {
        (weighted / items as f64 * 100.0).round() / 100.0
    } else {
        0.0
    };

    Ok(ReportTotals {
        total_analyses: count,
        total_items: items,
        positive,
        negative,
        neutral,
        average_score,
    })
}
