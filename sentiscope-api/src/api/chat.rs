//! Chat about a saved analysis

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use sentiscope_common::api::ApiResponse;
use sentiscope_common::db::{AnalysisWithItems, ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};

use super::extract::{AuthUser, JsonBody};
use crate::db::{analyses, chat_messages};
use crate::services::ai::ChatContext;
use crate::services::openai_client::ChatTurn;
use crate::{ApiError, ApiResult, AppState};

/// Longest question accepted
const MAX_QUESTION_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub analysis_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryResponse {
    pub analysis_id: String,
    pub messages: Vec<ChatMessage>,
}

fn chat_context(saved: &AnalysisWithItems) -> ChatContext {
    let analysis = &saved.analysis;
    ChatContext {
        title: analysis.title.clone(),
        input_type: analysis.input_type.as_str().to_string(),
        total: analysis.total_items,
        positive: analysis.positive_count,
        negative: analysis.negative_count,
        neutral: analysis.neutral_count,
        average_score: analysis.average_score,
        insights: analysis.ai_insights.clone(),
        samples: saved
            .items
            .iter()
            .map(|item| (item.text_content.clone(), item.sentiment_label, item.confidence_score))
            .collect(),
    }
}

fn turns(history: &[ChatMessage]) -> Vec<ChatTurn> {
    history
        .iter()
        .map(|m| match m.role {
            MessageRole::User => ChatTurn::user(m.content.clone()),
            MessageRole::Assistant => ChatTurn::assistant(m.content.clone()),
        })
        .collect()
}

async fn owned_analysis(state: &AppState, id: &str, user_id: &str) -> ApiResult<AnalysisWithItems> {
    analyses::get_analysis(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Analysis not found"))
}

/// POST /api/analysis/chat
///
/// **Request:** `{"analysisId", "message"}`
/// **Response:** `{reply, userMessage, assistantMessage}`
///
/// Both messages are stored only after the model answered.
///
/// **Errors:**
/// - 400 Bad Request: missing analysis id or message
/// - 404 Not Found: analysis absent or owned by another user
/// - 503 Service Unavailable: no language model configured
pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(request): JsonBody<ChatRequest>,
) -> ApiResult<Json<ApiResponse<ChatResponse>>> {
    let question = request.message.trim();
    if request.analysis_id.trim().is_empty() || question.is_empty() {
        return Err(ApiError::bad_request("Analysis ID and message are required"));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::bad_request(format!(
            "Message must be at most {} characters",
            MAX_QUESTION_CHARS
        )));
    }
    if !state.ai.is_available() {
        return Err(ApiError::ai_unavailable());
    }

    let saved = owned_analysis(&state, &request.analysis_id, &user.id).await?;
    let history = chat_messages::list_messages(&state.db, &saved.analysis.id).await?;

    let reply = state
        .ai
        .chat(question, &chat_context(&saved), &turns(&history))
        .await?;

    let (user_message, assistant_message) =
        chat_messages::append_exchange(&state.db, &saved.analysis.id, question, &reply).await?;

    tracing::debug!(analysis_id = %saved.analysis.id, turns = history.len() + 2, "Chat exchange stored");

    Ok(Json(ApiResponse::ok(
        "Chat response generated",
        ChatResponse {
            reply,
            user_message,
            assistant_message,
        },
    )))
}

/// GET /api/analysis/history/:id/chat
///
/// **Response:** `{analysisId, messages}` oldest first
pub async fn chat_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<ChatHistoryResponse>>> {
    let saved = owned_analysis(&state, &id, &user.id).await?;
    let messages = chat_messages::list_messages(&state.db, &saved.analysis.id).await?;

    Ok(Json(ApiResponse::ok(
        "Chat history retrieved successfully",
        ChatHistoryResponse {
            analysis_id: saved.analysis.id,
            messages,
        },
    )))
}

/// Build chat routes
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis/chat", post(chat))
        .route("/api/analysis/history/:id/chat", get(chat_history))
}
