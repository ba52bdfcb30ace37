//! Language-model backed analysis operations
//!
//! Column detection for CSV uploads, business insights, sentiment
//! explanations, structured deep analysis, screenshot comment parsing and
//! the per-analysis chat assistant. All of them require a configured
//! [`LanguageModel`]; without one every call fails with 503.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::openai_client::{ChatTurn, CompletionRequest, LanguageModel};
use super::sentiment::{SentimentStatistics, TextAnalysisResult};
use crate::error::ApiError;
use sentiscope_common::SentimentLabel;

/// Samples included in an insights prompt
const INSIGHT_SAMPLES: usize = 8;
/// Characters kept from each insight sample
const INSIGHT_SAMPLE_CHARS: usize = 120;
/// Items quoted back to the model in chat context
const CHAT_CONTEXT_SAMPLES: usize = 20;

pub const UNKNOWN_USER: &str = "Unknown User";
pub const UNKNOWN_TIME: &str = "Unknown Time";

/// Structured verdict from deep analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepAnalysis {
    pub sentiment: SentimentLabel,
    pub score: f64,
    pub explanation: String,
    pub key_phrases: Vec<String>,
}

impl DeepAnalysis {
    /// Placeholder for a text whose deep analysis call failed
    pub fn failed() -> Self {
        Self {
            sentiment: SentimentLabel::Neutral,
            score: 0.5,
            explanation: "Analysis failed".to_string(),
            key_phrases: Vec::new(),
        }
    }

    /// Interpret the model's JSON, defaulting missing fields
    pub fn from_json(value: &Value) -> Self {
        let sentiment = value
            .get("sentiment")
            .and_then(Value::as_str)
            .and_then(SentimentLabel::from_model_label)
            .unwrap_or(SentimentLabel::Neutral);

        let score = value
            .get("score")
            .and_then(Value::as_f64)
            .filter(|s| *s > 0.0)
            .map(|s| s.min(1.0))
            .unwrap_or(0.5);

        let explanation = value
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let key_phrases = value
            .get("keyPhrases")
            .and_then(Value::as_array)
            .map(|phrases| {
                phrases
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            sentiment,
            score,
            explanation,
            key_phrases,
        }
    }
}

/// One comment recovered from OCR text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedComment {
    pub username: String,
    pub timestamp: String,
    pub comment: String,
}

/// What the chat assistant knows about an analysis
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub title: String,
    pub input_type: String,
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub average_score: f64,
    pub insights: Option<String>,
    /// (text, label, score)
    pub samples: Vec<(String, SentimentLabel, f64)>,
}

/// Language-model operations; all fail with 503 when no model is configured
#[derive(Clone)]
pub struct AiService {
    model: Option<Arc<dyn LanguageModel>>,
}

impl AiService {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    fn model(&self) -> Result<&Arc<dyn LanguageModel>, ApiError> {
        self.model.as_ref().ok_or_else(ApiError::ai_unavailable)
    }

    /// Ask the model which column holds the free text
    ///
    /// The answer is only accepted when it names one of `columns` exactly.
    pub async fn detect_text_column(
        &self,
        columns: &[String],
        sample_rows: &[BTreeMap<String, String>],
    ) -> Result<String, ApiError> {
        let model = self.model()?;

        let listing = columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{}. {}", i + 1, col))
            .collect::<Vec<_>>()
            .join("\n");
        let samples = serde_json::to_string_pretty(&sample_rows.iter().take(3).collect::<Vec<_>>())
            .unwrap_or_default();

        let prompt = format!(
            "You are a data analysis assistant. I have a CSV file with the following columns:\n\n\
             {listing}\n\n\
             Here are 3 sample rows of data:\n{samples}\n\n\
             Which column contains the main text/comment/review content that should be analyzed for sentiment analysis?\n\
             Return ONLY the exact column name, nothing else."
        );

        let request = CompletionRequest::new(
            "You are a data analysis assistant that identifies the correct column for text analysis. \
             Return only the exact column name.",
            prompt,
        )
        .temperature(0.3)
        .max_tokens(50);

        let answer = model.complete(request).await?;
        let detected = answer.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');

        if columns.iter().any(|c| c == detected) {
            tracing::info!(column = %detected, "AI detected text column");
            Ok(detected.to_string())
        } else {
            tracing::warn!(answer = %answer, "AI returned invalid column");
            Err(ApiError::bad_request(format!("Invalid column detected: {}", detected)))
        }
    }

    /// Business-oriented summary of a result set
    pub async fn generate_insights(
        &self,
        stats: &SentimentStatistics,
        samples: &[TextAnalysisResult],
    ) -> Result<String, ApiError> {
        let model = self.model()?;

        let rate = |n: usize| {
            if stats.total > 0 {
                n as f64 / stats.total as f64 * 100.0
            } else {
                0.0
            }
        };

        let sample_lines = samples
            .iter()
            .take(INSIGHT_SAMPLES)
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "{}. [{}] \"{}\"",
                    i + 1,
                    r.sentiment.label.as_str().to_uppercase(),
                    clip(&r.text, INSIGHT_SAMPLE_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are a professional sentiment analysis consultant providing insights for business decision-making.\n\n\
             ANALYSIS DATA:\n\
             Total Analyzed: {total} items\n\
             Positive: {pos} ({pos_rate:.1}%)\n\
             Negative: {neg} ({neg_rate:.1}%)\n\
             Neutral: {neu} ({neu_rate:.1}%)\n\
             Average Sentiment Score: {avg:.3}\n\n\
             SAMPLE FEEDBACK:\n{sample_lines}\n\n\
             TASK:\n\
             Provide a comprehensive analysis structured as follows:\n\n\
             1. OVERALL SENTIMENT: One clear sentence about the dominant sentiment and what it means\n\
             2. KEY FINDINGS: 2-3 specific observations from the data (mention percentages, patterns, or trends)\n\
             3. ACTIONABLE RECOMMENDATIONS: 2-3 concrete, specific actions to improve sentiment or maintain positive trends\n\
             4. PRIORITY AREAS: What should be addressed first based on the negative/neutral feedback\n\n\
             Make it professional, data-driven, and immediately actionable for business stakeholders.",
            total = stats.total,
            pos = stats.positive,
            pos_rate = rate(stats.positive),
            neg = stats.negative,
            neg_rate = rate(stats.negative),
            neu = stats.neutral,
            neu_rate = rate(stats.neutral),
            avg = stats.average_score,
        );

        let request = CompletionRequest::new(
            "You are an expert business analyst specializing in sentiment analysis and customer experience insights. \
             Provide clear, actionable, and professional insights that help businesses make data-driven decisions.",
            prompt,
        )
        .temperature(0.7)
        .max_tokens(500);

        let insights = model.complete(request).await?;
        tracing::info!(chars = insights.len(), "AI insights generated");
        Ok(insights)
    }

    /// Short explanation of why a text received its label
    pub async fn explain_sentiment(
        &self,
        text: &str,
        label: SentimentLabel,
        score: f64,
    ) -> Result<String, ApiError> {
        let model = self.model()?;

        let prompt = format!(
            "Analyze and explain the sentiment classification for this text:\n\n\
             TEXT: \"{text}\"\n\n\
             CLASSIFICATION: {label}\n\
             CONFIDENCE: {confidence:.1}%\n\n\
             Provide a clear explanation that includes:\n\
             1. The main reason for this sentiment classification\n\
             2. Specific words or phrases that contributed (quote them)\n\
             3. Any emotional tone or context that influenced the decision\n\n\
             Keep it concise (2-3 sentences) but insightful.",
            label = label.as_str().to_uppercase(),
            confidence = score * 100.0,
        );

        let request = CompletionRequest::new(
            "You are a sentiment analysis expert who explains classifications with specific evidence. \
             Always quote key words/phrases from the text that influenced the sentiment decision.",
            prompt,
        )
        .temperature(0.5)
        .max_tokens(200);

        model.complete(request).await
    }

    /// Context-aware sentiment verdict with explanation and key phrases
    pub async fn deep_analysis(&self, text: &str) -> Result<DeepAnalysis, ApiError> {
        let model = self.model()?;

        let prompt = format!(
            "Perform deep sentiment analysis on this text with advanced context understanding:\n\n\
             TEXT: \"{text}\"\n\n\
             TASK:\n\
             Analyze the sentiment considering:\n\
             - Explicit emotional words and tone\n\
             - Implicit meaning and context\n\
             - Sarcasm, irony, or nuanced language\n\
             - Overall message and intent\n\n\
             Return a JSON object with these fields:\n\
             {{\n  \"sentiment\": \"positive\" | \"negative\" | \"neutral\",\n  \
             \"score\": <confidence score 0.0 to 1.0>,\n  \
             \"explanation\": \"<2-3 sentences explaining the classification with specific evidence from the text>\",\n  \
             \"keyPhrases\": [\"<phrase 1>\", \"<phrase 2>\", \"<phrase 3>\", \"<phrase 4>\"]\n}}\n\n\
             Guidelines:\n\
             - Score should reflect confidence (0.9-1.0 = very confident, 0.6-0.8 = moderately confident, 0.5-0.6 = uncertain)\n\
             - keyPhrases should be actual quotes from the text that most influenced the sentiment\n\
             - Explanation should quote specific words/phrases and explain their emotional impact\n\n\
             Return ONLY valid JSON, no additional text."
        );

        let request = CompletionRequest::new(
            "You are an expert sentiment analyst with deep understanding of language nuances, context, sarcasm, \
             and emotional tone. Provide accurate sentiment analysis with clear evidence. Return only valid JSON.",
            prompt,
        )
        .temperature(0.3)
        .max_tokens(400)
        .json();

        let content = model.complete(request).await?;
        let value = parse_json_content(&content)?;
        Ok(DeepAnalysis::from_json(&value))
    }

    /// Split OCR text from a social-media screenshot into comments
    pub async fn parse_comments(&self, ocr_text: &str) -> Result<Vec<ParsedComment>, ApiError> {
        let model = self.model()?;

        let prompt = format!(
            "You are an expert at parsing social media comments from OCR-extracted text across ALL platforms.\n\n\
             OCR EXTRACTED TEXT:\n\
             ----------------------------------\n\
             {ocr_text}\n\
             ----------------------------------\n\n\
             TASK:\n\
             Parse this OCR text and extract individual comments with their metadata. The text may come from any \
             platform (YouTube, Instagram, Twitter/X, Facebook, TikTok, LinkedIn, Reddit, Discord, Telegram, \
             WhatsApp, Google Reviews, Amazon Reviews, or others).\n\n\
             Each comment typically has:\n\
             - Username/Name (may have @, u/, #tag, or plain name)\n\
             - Timestamp (e.g. \"5 days ago\", \"Jan 15, 2024\", \"12:45 PM\")\n\
             - Comment text (the actual content/message/review)\n\n\
             Ignore UI elements like \"Reply\", \"Translate to English\", \"like\", \"share\", \"follow\", \
             \"view replies\", \"show more\", button labels and navigation elements.\n\n\
             Return a JSON object with a comments array:\n\
             {{\n  \"comments\": [\n    {{\n      \"username\": \"username_here\",\n      \
             \"timestamp\": \"time_ago_here\",\n      \"comment\": \"actual_comment_text_here\"\n    }}\n  ]\n}}\n\n\
             Guidelines:\n\
             - Merge multi-line comments into a single comment field\n\
             - Preserve emojis in comment text\n\
             - If username is missing use \"{UNKNOWN_USER}\", if timestamp is missing use \"{UNKNOWN_TIME}\"\n\
             - Skip empty, meaningless, or UI-only text\n\n\
             Return ONLY valid JSON object with comments array, no additional text."
        );

        let request = CompletionRequest::new(
            "You are an expert at parsing and structuring social media comments from OCR text. You accurately \
             identify usernames, timestamps, and comment content while filtering out UI elements. Return only valid JSON.",
            prompt,
        )
        .temperature(0.3)
        .max_tokens(2000)
        .json();

        let content = model.complete(request).await?;
        let value = parse_json_content(&content)?;
        let comments = comments_from_json(&value);

        tracing::info!(count = comments.len(), "Parsed comments from OCR text");
        Ok(comments)
    }

    /// Answer a question about one analysis, continuing an earlier conversation
    pub async fn chat(
        &self,
        question: &str,
        context: &ChatContext,
        history: &[ChatTurn],
    ) -> Result<String, ApiError> {
        let model = self.model()?;

        let mut messages: Vec<ChatTurn> = history.to_vec();
        messages.push(ChatTurn::user(question));

        let request = CompletionRequest {
            system: chat_system_prompt(context),
            messages,
            temperature: 0.7,
            max_tokens: 800,
            json_mode: false,
        };

        model.complete(request).await
    }
}

fn chat_system_prompt(context: &ChatContext) -> String {
    let samples = context
        .samples
        .iter()
        .take(CHAT_CONTEXT_SAMPLES)
        .enumerate()
        .map(|(i, (text, label, score))| {
            format!(
                "{}. [{} {:.2}] \"{}\"",
                i + 1,
                label.as_str().to_uppercase(),
                score,
                clip(text, INSIGHT_SAMPLE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let insights = context
        .insights
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("(none generated)");

    format!(
        "You are SentiScope's analysis assistant. Answer questions about the sentiment analysis below. \
         Base every answer on this data, cite numbers and quote sample texts when useful, and say so when the \
         data cannot answer a question.\n\n\
         ANALYSIS: {title} ({input_type})\n\
         Total items: {total}\n\
         Positive: {pos}\n\
         Negative: {neg}\n\
         Neutral: {neu}\n\
         Average score: {avg:.3}\n\n\
         AI INSIGHTS:\n{insights}\n\n\
         SAMPLE RESULTS:\n{samples}",
        title = context.title,
        input_type = context.input_type,
        total = context.total,
        pos = context.positive,
        neg = context.negative,
        neu = context.neutral,
        avg = context.average_score,
    )
}

/// Accept either `{"comments": [...]}` or a bare array
pub fn comments_from_json(value: &Value) -> Vec<ParsedComment> {
    let entries = match value {
        Value::Array(items) => items.as_slice(),
        other => other
            .get("comments")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    };

    let field = |entry: &Value, name: &str| {
        entry
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    entries
        .iter()
        .filter_map(|entry| {
            let comment = field(entry, "comment")?;
            Some(ParsedComment {
                username: field(entry, "username").unwrap_or_else(|| UNKNOWN_USER.to_string()),
                timestamp: field(entry, "timestamp").unwrap_or_else(|| UNKNOWN_TIME.to_string()),
                comment,
            })
        })
        .collect()
}

/// Parse model output as JSON, tolerating a surrounding code fence
pub fn parse_json_content(content: &str) -> Result<Value, ApiError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if unfenced.is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    serde_json::from_str(unfenced).map_err(|e| {
        tracing::warn!("AI returned invalid JSON: {}", e);
        ApiError::internal("AI service returned invalid JSON")
    })
}

/// First `max_chars` characters of `text`
fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with a fixed answer and records requests
    struct CannedModel {
        answer: String,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedModel {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, ApiError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.answer.clone())
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unavailable_without_model() {
        let ai = AiService::new(None);
        assert!(!ai.is_available());
        let err = ai.deep_analysis("hi").await.unwrap_err();
        assert_eq!(err.status.as_u16(), 503);
        assert_eq!(err.message, "AI service is not available");
    }

    #[tokio::test]
    async fn test_detect_column_requires_exact_match() {
        let ai = AiService::new(Some(CannedModel::new("\"review_text\"")));
        let found = ai
            .detect_text_column(&columns(&["id", "review_text"]), &[])
            .await
            .unwrap();
        assert_eq!(found, "review_text");

        let ai = AiService::new(Some(CannedModel::new("Review Text")));
        assert!(ai
            .detect_text_column(&columns(&["id", "review_text"]), &[])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_deep_analysis_uses_json_mode() {
        let model = CannedModel::new(
            r#"{"sentiment":"Very Negative","score":0.92,"explanation":"Angry.","keyPhrases":["never again"]}"#,
        );
        let ai = AiService::new(Some(model.clone()));

        let verdict = ai.deep_analysis("Never again.").await.unwrap();
        assert_eq!(verdict.sentiment, SentimentLabel::Negative);
        assert_eq!(verdict.key_phrases, vec!["never again"]);

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].max_tokens, 400);
    }

    #[test]
    fn test_deep_analysis_defaults() {
        let verdict = DeepAnalysis::from_json(&json!({}));
        assert_eq!(verdict.sentiment, SentimentLabel::Neutral);
        assert_eq!(verdict.score, 0.5);
        assert_eq!(verdict.explanation, "");
        assert!(verdict.key_phrases.is_empty());

        let verdict = DeepAnalysis::from_json(&json!({"sentiment": "sarcastic", "score": 3.0}));
        assert_eq!(verdict.sentiment, SentimentLabel::Neutral);
        assert_eq!(verdict.score, 1.0);
    }

    #[test]
    fn test_comments_from_either_shape() {
        let wrapped = json!({"comments": [
            {"username": "@ana", "timestamp": "2 days ago", "comment": "Mantap!"},
            {"comment": "no metadata"},
            {"username": "ghost", "comment": "   "}
        ]});
        let comments = comments_from_json(&wrapped);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].username, UNKNOWN_USER);
        assert_eq!(comments[1].timestamp, UNKNOWN_TIME);

        let bare = json!([{"username": "bob", "timestamp": "now", "comment": "ok"}]);
        assert_eq!(comments_from_json(&bare).len(), 1);

        assert!(comments_from_json(&json!({"other": 1})).is_empty());
    }

    #[test]
    fn test_parse_json_content_strips_fence() {
        let value = parse_json_content("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
        assert!(parse_json_content("not json").is_err());
        assert!(parse_json_content("").unwrap().is_object());
    }

    #[tokio::test]
    async fn test_chat_sends_history_then_question() {
        let model = CannedModel::new("Mostly positive.");
        let ai = AiService::new(Some(model.clone()));
        let context = ChatContext {
            title: "Reviews".into(),
            total: 3,
            positive: 2,
            ..Default::default()
        };
        let history = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];

        let reply = ai.chat("How did it go?", &context, &history).await.unwrap();
        assert_eq!(reply, "Mostly positive.");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].messages.len(), 3);
        assert_eq!(requests[0].messages[2].content, "How did it go?");
        assert!(requests[0].system.contains("Total items: 3"));
    }

    #[test]
    fn test_clip_is_char_aware() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("short", 120), "short");
    }
}
