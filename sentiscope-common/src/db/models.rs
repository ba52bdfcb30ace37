//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SentimentLabel;

/// How the texts of an analysis were submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Batch,
    Csv,
    Image,
    Keywords,
    Deep,
    Dataset,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Batch => "batch",
            InputType::Csv => "csv",
            InputType::Image => "image",
            InputType::Keywords => "keywords",
            InputType::Deep => "deep",
            InputType::Dataset => "dataset",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(InputType::Text),
            "batch" => Ok(InputType::Batch),
            "csv" => Ok(InputType::Csv),
            "image" => Ok(InputType::Image),
            "keywords" => Ok(InputType::Keywords),
            "deep" => Ok(InputType::Deep),
            "dataset" => Ok(InputType::Dataset),
            other => Err(format!("Unknown input type: {}", other)),
        }
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Row of the `users` table
///
/// The password hash never leaves the service; it is skipped on serialization.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row of the `analyses` table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub input_type: InputType,
    pub total_items: i64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub neutral_count: i64,
    pub average_score: f64,
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub ai_insights: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the `analysis_items` table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisItem {
    pub id: String,
    pub analysis_id: String,
    pub position: i64,
    pub text_content: String,
    pub sentiment_label: SentimentLabel,
    pub confidence_score: f64,
    #[sqlx(json)]
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Analysis together with its items
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisWithItems {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub items: Vec<AnalysisItem>,
}

/// Row of the `chat_messages` table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub analysis_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
