//! OpenAI chat-completions client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Speaker of one conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// One chat-completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the model for a JSON object response
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![ChatTurn::user(prompt)],
            temperature: 0.7,
            max_tokens: 500,
            json_mode: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Large language model that completes a conversation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the trimmed assistant message content
    async fn complete(&self, request: CompletionRequest) -> Result<String, ApiError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_base: String, api_key: String, model: String) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_base,
            api_key,
            model,
        })
    }

    fn payload(&self, request: &CompletionRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        messages.extend(
            request
                .messages
                .iter()
                .map(|turn| json!({ "role": turn.role, "content": turn.content })),
        );

        let mut payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if request.json_mode {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        payload
    }
}

/// Pull `choices[0].message.content` out of a completion response
pub fn extract_content(data: &Value) -> Result<String, ApiError> {
    if let Some(error) = data.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        return Err(ApiError::internal(format!("OpenAI API error: {}", message)));
    }

    let content = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .ok_or_else(|| ApiError::internal("OpenAI response missing message content"))?;

    Ok(content.trim().to_string())
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.api_base);

        tracing::debug!(
            model = %self.model,
            turns = request.messages.len(),
            json_mode = request.json_mode,
            "Calling chat completions"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(&request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::request_timeout("AI request timed out")
                } else {
                    tracing::error!("OpenAI request failed: {}", e);
                    ApiError::internal("Failed to reach AI service")
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 401 {
            return Err(ApiError::internal("Invalid OpenAI API key"));
        }

        let data: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(status = status.as_u16(), "AI returned non-JSON response: {}", e);
            ApiError::internal("AI service returned an invalid response")
        })?;

        if !status.is_success() {
            let message = data
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(ApiError::from_status_code(
                status.as_u16(),
                format!("OpenAI API error: {}", message),
            ));
        }

        extract_content(&data)
    }
}
