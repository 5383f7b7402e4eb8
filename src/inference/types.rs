//! Shared types for the inference client.
//!
//! Request/response bodies for the OpenAI Chat Completions API and the
//! Anthropic Messages API, plus the classification result handed back to the
//! pipeline.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Request body for `POST /v1/messages`.
///
/// The system prompt is a top-level field, not a message.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// Non-streaming Chat Completions response (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Messages API response (only the fields we read).
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// One content block; only `text` blocks carry an answer.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Outcome of one classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Normalized label, always starting with the configured prefix.
    pub label: String,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f64,
    /// The provider's unmodified answer, when a provider answered.
    pub raw_provider_text: Option<String>,
}

impl ClassificationResult {
    /// A result that did not come from a provider.
    pub fn fixed(prefix: &str, message: &str, confidence: f64) -> Self {
        Self {
            label: format!("{prefix} {message}"),
            confidence,
            raw_provider_text: None,
        }
    }
}
