//! Model selection across configured providers.
//!
//! Selection is a pure priority function over the configured provider
//! set: no randomness, no load balancing, no call-time fallback chains.
//! Zero configured providers for a requested capability is a
//! configuration error, surfaced immediately and never retried.

use crate::agent::{GenerationAgent, StructuredOutputAgent};
use crate::claude_api_agent::ClaudeApiAgent;
use crate::gemini_api_agent::GeminiApiAgent;
use crate::openai_api_agent::OpenAiApiAgent;
use crate::secrets::SecretConfig;
use skillforge_core::error::{ForgeError, Result};
use std::sync::Arc;

/// The two backend capabilities the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCapability {
    /// Streaming text generation.
    Generation,
    /// Structured (JSON object) output.
    StructuredOutput,
}

/// Deterministically selects one backend per capability.
///
/// Priority order is fixed: generation prefers OpenAI then Claude;
/// structured output prefers OpenAI then Gemini.
pub struct ModelSelector {
    openai: Option<Arc<OpenAiApiAgent>>,
    claude: Option<Arc<ClaudeApiAgent>>,
    gemini: Option<Arc<GeminiApiAgent>>,
}

impl ModelSelector {
    /// Builds a selector over explicitly constructed agents. Mostly
    /// useful for tests; production callers use [`Self::from_secrets`].
    pub fn new(
        openai: Option<OpenAiApiAgent>,
        claude: Option<ClaudeApiAgent>,
        gemini: Option<GeminiApiAgent>,
    ) -> Self {
        Self {
            openai: openai.map(Arc::new),
            claude: claude.map(Arc::new),
            gemini: gemini.map(Arc::new),
        }
    }

    /// Builds the configured provider set once from credentials.
    pub fn from_secrets(secrets: &SecretConfig) -> Self {
        let openai = secrets.openai.as_ref().map(|cred| {
            let agent = OpenAiApiAgent::with_default_model(&cred.api_key);
            match &cred.model_name {
                Some(model) => agent.with_model(model),
                None => agent,
            }
        });
        let claude = secrets.claude.as_ref().map(|cred| {
            let agent = ClaudeApiAgent::with_default_model(&cred.api_key);
            match &cred.model_name {
                Some(model) => agent.with_model(model),
                None => agent,
            }
        });
        let gemini = secrets.gemini.as_ref().map(|cred| {
            let agent = GeminiApiAgent::with_default_model(&cred.api_key);
            match &cred.model_name {
                Some(model) => agent.with_model(model),
                None => agent,
            }
        });
        Self::new(openai, claude, gemini)
    }

    /// Selects the generation backend: OpenAI, then Claude.
    ///
    /// # Errors
    ///
    /// Returns a fatal `Config` error when no generation-capable provider
    /// is configured.
    pub fn select_generation(&self) -> Result<Arc<dyn GenerationAgent>> {
        if let Some(agent) = &self.openai {
            return Ok(agent.clone());
        }
        if let Some(agent) = &self.claude {
            return Ok(agent.clone());
        }
        Err(no_provider_error(ModelCapability::Generation))
    }

    /// Selects the structured-output backend: OpenAI, then Gemini.
    ///
    /// # Errors
    ///
    /// Returns a fatal `Config` error when no structured-output-capable
    /// provider is configured.
    pub fn select_structured(&self) -> Result<Arc<dyn StructuredOutputAgent>> {
        if let Some(agent) = &self.openai {
            return Ok(agent.clone());
        }
        if let Some(agent) = &self.gemini {
            return Ok(agent.clone());
        }
        Err(no_provider_error(ModelCapability::StructuredOutput))
    }

    /// Returns true when at least one provider backs the capability.
    pub fn supports(&self, capability: ModelCapability) -> bool {
        match capability {
            ModelCapability::Generation => self.openai.is_some() || self.claude.is_some(),
            ModelCapability::StructuredOutput => self.openai.is_some() || self.gemini.is_some(),
        }
    }
}

fn no_provider_error(capability: ModelCapability) -> ForgeError {
    let capability = match capability {
        ModelCapability::Generation => "generation",
        ModelCapability::StructuredOutput => "structured output",
    };
    ForgeError::config(format!(
        "No {capability} provider available. Configure at least one API key in \
         ~/.config/skillforge/secret.json or the environment."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_providers_is_fatal_config_error() {
        let selector = ModelSelector::new(None, None, None);
        assert!(selector.select_generation().err().unwrap().is_config());
        assert!(selector.select_structured().err().unwrap().is_config());
    }

    #[test]
    fn test_generation_priority_prefers_openai() {
        let selector = ModelSelector::new(
            Some(OpenAiApiAgent::new("k", "m")),
            Some(ClaudeApiAgent::new("k", "m")),
            None,
        );
        assert_eq!(selector.select_generation().unwrap().name(), "openai");
    }

    #[test]
    fn test_generation_falls_back_to_claude() {
        let selector = ModelSelector::new(None, Some(ClaudeApiAgent::new("k", "m")), None);
        assert_eq!(selector.select_generation().unwrap().name(), "claude");
    }

    #[test]
    fn test_structured_falls_back_to_gemini() {
        let selector = ModelSelector::new(None, None, Some(GeminiApiAgent::new("k", "m")));
        assert_eq!(selector.select_structured().unwrap().name(), "gemini");
        // Gemini alone cannot serve generation.
        assert!(selector.select_generation().err().unwrap().is_config());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let selector = ModelSelector::new(
            Some(OpenAiApiAgent::new("k", "m")),
            Some(ClaudeApiAgent::new("k", "m")),
            Some(GeminiApiAgent::new("k", "m")),
        );
        for _ in 0..10 {
            assert_eq!(selector.select_generation().unwrap().name(), "openai");
            assert_eq!(selector.select_structured().unwrap().name(), "openai");
        }
    }

    #[test]
    fn test_supports() {
        let selector = ModelSelector::new(None, Some(ClaudeApiAgent::new("k", "m")), None);
        assert!(selector.supports(ModelCapability::Generation));
        assert!(!selector.supports(ModelCapability::StructuredOutput));
    }
}
