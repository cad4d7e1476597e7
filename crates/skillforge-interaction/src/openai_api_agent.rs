//! OpenAiApiAgent - Direct REST API implementation for OpenAI.
//!
//! Supports both streaming chat completions (token generation) and
//! JSON-mode structured output. Configuration priority:
//! ~/.config/skillforge/secret.json > environment variables

use crate::agent::{
    map_http_error, parse_retry_after, AgentError, ChatMessage, CompletionRequest,
    GenerationAgent, StructuredOutputAgent, TokenStream,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_OPENAI_MODEL: &str = "gpt-5";
const BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Agent implementation that talks to the OpenAI chat-completions API.
#[derive(Clone)]
pub struct OpenAiApiAgent {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiApiAgent {
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
        Self::new(api_key, DEFAULT_OPENAI_MODEL)
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_messages(&self, system: &str, messages: &[ChatMessage]) -> Vec<WireMessage> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system.trim().is_empty() {
            wire.push(WireMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        for message in messages {
            wire.push(WireMessage {
                role: message.role.as_str(),
                content: message.content.clone(),
            });
        }
        wire
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, AgentError> {
        let response = self
            .client
            .post(BASE_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|err| AgentError::ProcessError {
                status_code: None,
                message: format!("OpenAI API request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read OpenAI error body".to_string());
            return Err(map_http_error(status, body_text, retry_after, extract_error_message));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationAgent for OpenAiApiAgent {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, AgentError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": self.build_messages(&request.system, &request.messages),
            "max_tokens": request.max_tokens,
            "temperature": 0.7,
            "stream": true,
        });

        let response = self.post(&body).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .map(|event| {
                let event = event.map_err(|e| {
                    AgentError::ProcessError {
                        status_code: None,
                        message: format!("OpenAI stream error: {e}"),
                        is_retryable: true,
                        retry_after: None,
                    }
                })?;

                if event.data == "[DONE]" {
                    return Ok(None);
                }

                let chunk: StreamChunk = serde_json::from_str(&event.data).map_err(|e| {
                    AgentError::ExecutionFailed(format!("Malformed OpenAI stream chunk: {e}"))
                })?;

                Ok(chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty()))
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

#[async_trait]
impl StructuredOutputAgent for OpenAiApiAgent {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate_object(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, AgentError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": self.build_messages(system, &[ChatMessage::user(prompt)]),
            "temperature": 0.7,
            "response_format": { "type": "json_object" },
        });

        let response = self.post(&body).await?;

        let parsed: CompletionResponse = response.json().await.map_err(|err| {
            AgentError::Other(format!("Failed to parse OpenAI response: {err}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                AgentError::ExecutionFailed("OpenAI returned no choices in the response".into())
            })?;

        serde_json::from_str(&content).map_err(|err| {
            AgentError::ExecutionFailed(format!(
                "OpenAI JSON-mode response is not valid JSON: {err}"
            ))
        })
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
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
