//! Model client layer for Parley.
//!
//! Provides:
//! - the conversation message model shared with the orchestrator
//! - the `ModelClient` trait with a tagged `CompletionResult`
//! - an OpenAI-compatible chat-completions client (plain and SSE streaming)
//! - bounded retry for transient endpoint failures
//! - token usage tracking

pub mod openai;
pub mod retry;
pub mod streaming;
pub mod token_tracker;
pub mod tools;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::{OpenAiClient, OpenAiConfig};
pub use retry::RetryPolicy;
pub use token_tracker::TokenTracker;

/// JSON object carried as tool-call arguments.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, for logs and usage tracking.
    fn model(&self) -> &str;

    /// One completion over the full `history`. `tools` is `None` when the
    /// model must answer in text.
    async fn complete(
        &self,
        history: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Completion, AiError>;

    /// Same contract as [`complete`](Self::complete); text is additionally
    /// handed to `on_chunk` as it arrives. The returned `Completion` is the
    /// aggregate and is the only thing callers may act on.
    async fn complete_streaming(
        &self,
        history: &[Message],
        tools: Option<&[ToolDefinition]>,
        on_chunk: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<Completion, AiError> {
        let completion = self.complete(history, tools).await?;
        if let CompletionResult::Answer { text } = &completion.outcome {
            if !text.is_empty() {
                on_chunk(text.clone());
            }
        }
        Ok(completion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    /// Set on `tool` messages: the id of the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on `assistant` messages that ask for tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant turn that requests tool calls. `content` is whatever text
    /// the model sent alongside, often none.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    /// Content as text, empty when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Tool calls requested by this message, empty for anything else.
    pub fn requested_calls(&self) -> &[ToolCallRequest] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Schema of a callable tool in the shape handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub tool_name: String,
    pub arguments: Arguments,
}

/// What the model decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResult {
    Answer {
        text: String,
    },
    ToolInvocation {
        requests: Vec<ToolCallRequest>,
        /// The model's own tool-call turn, to be appended to history verbatim.
        assistant_message: Message,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub outcome: CompletionResult,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("API error: HTTP {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The endpoint answered, but not in the shape we expect.
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("Timeout")]
    Timeout,
}

impl AiError {
    /// Worth another attempt: connection trouble, throttling, timeouts, 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::ApiError { status, .. } => *status >= 500,
            AiError::RateLimited | AiError::NetworkError(_) | AiError::Timeout => true,
            AiError::ProtocolError(_) => false,
        }
    }

    /// The endpoint could not be used at all (network, auth, throttling),
    /// as opposed to answering with something malformed.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, AiError::ProtocolError(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout
        } else {
            AiError::NetworkError(e.to_string())
        }
    }
}
