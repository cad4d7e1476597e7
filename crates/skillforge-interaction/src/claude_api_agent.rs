//! ClaudeApiAgent - Direct REST API implementation for Claude.
//!
//! This agent streams completions from the Claude messages API without CLI
//! dependency. Configuration priority:
//! ~/.config/skillforge/secret.json > environment variables

use crate::agent::{
    map_http_error, parse_retry_after, AgentError, CompletionRequest, GenerationAgent,
    TokenStream,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-6";
const BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Agent implementation that streams from the Claude HTTP API.
#[derive(Clone)]
pub struct ClaudeApiAgent {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeApiAgent {
    /// Creates a new agent with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Creates an agent with the default model.
    pub fn with_default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_CLAUDE_MODEL)
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl GenerationAgent for ClaudeApiAgent {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, AgentError> {
        let messages: Vec<WireMessage> = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect();

        if messages.is_empty() {
            return Err(AgentError::ExecutionFailed(
                "Claude request must include at least one message".into(),
            ));
        }

        let body = CreateMessageRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            system: (!request.system.trim().is_empty()).then(|| request.system.clone()),
            stream: true,
        };

        let response = self
            .client
            .post(BASE_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| AgentError::ProcessError {
                status_code: None,
                message: format!("Claude API request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Claude error body".to_string());
            return Err(map_http_error(status, body_text, retry_after, extract_error_message));
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .map(|event| {
                let event = event.map_err(|e| AgentError::ProcessError {
                    status_code: None,
                    message: format!("Claude stream error: {e}"),
                    is_retryable: true,
                    retry_after: None,
                })?;

                let parsed: StreamEvent = serde_json::from_str(&event.data).map_err(|e| {
                    AgentError::ExecutionFailed(format!("Malformed Claude stream event: {e}"))
                })?;

                match parsed {
                    StreamEvent::ContentBlockDelta { delta } => match delta {
                        BlockDelta::TextDelta { text } if !text.is_empty() => Ok(Some(text)),
                        _ => Ok(None),
                    },
                    StreamEvent::Error { error } => Err(AgentError::ProcessError {
                        status_code: None,
                        message: format!("Claude stream error: {}", error.message),
                        is_retryable: false,
                        retry_after: None,
                    }),
                    _ => Ok(None),
                }
            })
            .filter_map(|result: Result<Option<String>, AgentError>| async move {
                match result {
                    Ok(Some(token)) => Some(Ok(token)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(stream))
    }
}

#[derive(Serialize)]
struct CreateMessageRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

/// The subset of Claude streaming events the agent consumes. Unknown
/// event types (message_start, ping, content_block_start, ...) carry no
/// text and are skipped.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: BlockDelta },
    #[serde(rename = "error")]
    Error { error: StreamErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum BlockDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct StreamErrorBody {
    message: String,
}

fn extract_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|wrapper| wrapper.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_parsing() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#;
        match serde_json::from_str::<StreamEvent>(data).unwrap() {
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } => assert_eq!(text, "Hello"),
            _ => panic!("expected text delta"),
        }
    }

    #[test]
    fn test_unknown_events_skipped() {
        let data = r#"{"type":"message_start","message":{"id":"msg_1"}}"#;
        assert!(matches!(
            serde_json::from_str::<StreamEvent>(data).unwrap(),
            StreamEvent::Other
        ));
    }

    #[test]
    fn test_error_event_parsing() {
        let data = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        match serde_json::from_str::<StreamEvent>(data).unwrap() {
            StreamEvent::Error { error } => assert_eq!(error.message, "Overloaded"),
            _ => panic!("expected error event"),
        }
    }
}
