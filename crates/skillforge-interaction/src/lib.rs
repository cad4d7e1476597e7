//! Provider interaction layer: direct REST API agents for the supported
//! model backends, plus deterministic capability-based model selection.

pub mod agent;
pub mod claude_api_agent;
pub mod gemini_api_agent;
pub mod openai_api_agent;
pub mod secrets;
pub mod selector;

pub use agent::{
    AgentError, ChatMessage, ChatRole, CompletionRequest, GenerationAgent,
    StructuredOutputAgent, TokenStream,
};
pub use claude_api_agent::ClaudeApiAgent;
pub use gemini_api_agent::GeminiApiAgent;
pub use openai_api_agent::OpenAiApiAgent;
pub use secrets::{ProviderCredential, SecretConfig};
pub use selector::{ModelCapability, ModelSelector};
