//! Provider agent contracts.
//!
//! Two capabilities exist: token-stream generation and structured (JSON)
//! output. Each provider agent implements the trait(s) matching what its
//! API supports; the model selector picks one agent per capability.

use async_trait::async_trait;
use futures::Stream;
use reqwest::{StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by provider agents.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The agent could not execute the request at all.
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    /// The provider returned an error, possibly retryable.
    #[error("Provider error (status {status_code:?}): {message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Creates a ProcessError carrying a retry-after hint.
    pub fn process_error_with_retry_after(
        status_code: u16,
        message: impl Into<String>,
        is_retryable: bool,
        retry_after: Duration,
    ) -> Self {
        Self::ProcessError {
            status_code: Some(status_code),
            message: message.into(),
            is_retryable,
            retry_after: Some(retry_after),
        }
    }

    /// True when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProcessError {
                is_retryable: true,
                ..
            }
        )
    }
}

/// Role of a chat message sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// The wire name shared by the OpenAI- and Claude-style APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A single chat message in provider-neutral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request: system instruction plus ordered conversation.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            max_tokens: 4096,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// An ordered stream of text tokens from a provider.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// A backend capable of streaming text generation.
#[async_trait]
pub trait GenerationAgent: Send + Sync {
    /// Provider name, for logging and selection diagnostics.
    fn name(&self) -> &'static str;

    /// Opens one token stream for the request. Token order is the
    /// provider's emission order; the stream ends when the provider
    /// finishes or errors.
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, AgentError>;
}

/// A backend capable of producing a structured JSON object.
#[async_trait]
pub trait StructuredOutputAgent: Send + Sync {
    /// Provider name, for logging and selection diagnostics.
    fn name(&self) -> &'static str;

    /// Produces a single JSON object for the prompt. A non-JSON payload
    /// from the provider is an `ExecutionFailed` error.
    async fn generate_object(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, AgentError>;
}

/// Classifies an HTTP status as retryable the way providers document it.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Parses a `retry-after` header value given in seconds.
pub fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}

/// Builds a ProcessError from a non-success HTTP response body.
///
/// `extract_message` pulls the provider-specific error message out of the
/// body; when it yields nothing the raw body is used.
pub fn map_http_error(
    status: StatusCode,
    body: String,
    retry_after: Option<Duration>,
    extract_message: impl Fn(&str) -> Option<String>,
) -> AgentError {
    let message = extract_message(&body).unwrap_or(body);
    let is_retryable = is_retryable_status(status);

    if let Some(delay) = retry_after {
        AgentError::process_error_with_retry_after(status.as_u16(), message, is_retryable, delay)
    } else {
        AgentError::ProcessError {
            status_code: Some(status.as_u16()),
            message,
            is_retryable,
            retry_after: None,
        }
    }
}
