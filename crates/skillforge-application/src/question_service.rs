//! Clarifying-question generation.
//!
//! One structured-output request per capability description. The response
//! is normalized, then validated against the question contract; a
//! violation is surfaced as such so the caller can fall back to the
//! no-clarification path instead of failing the whole flow.

use crate::prompts;
use skillforge_core::capability::CapabilityRequest;
use skillforge_core::error::{ForgeError, Result};
use skillforge_core::question::QuestionSet;
use skillforge_interaction::{ModelSelector, StructuredOutputAgent};
use std::sync::Arc;

/// Generates clarifying questions and config fields for a capability.
pub struct QuestionService {
    agent: Arc<dyn StructuredOutputAgent>,
}

impl QuestionService {
    /// Creates a service over an explicit structured-output agent.
    pub fn new(agent: Arc<dyn StructuredOutputAgent>) -> Self {
        Self { agent }
    }

    /// Creates a service by selecting the structured-output backend once.
    ///
    /// # Errors
    ///
    /// Propagates the selector's fatal `Config` error when no
    /// structured-output provider is configured.
    pub fn from_selector(selector: &ModelSelector) -> Result<Self> {
        Ok(Self::new(selector.select_structured()?))
    }

    /// Generates 3-5 clarifying questions plus 0-5 config fields.
    ///
    /// Pure request/response against the provider; no side effects.
    ///
    /// # Errors
    ///
    /// - `Provider` when the backend call fails
    /// - `ContractViolation` when the payload is malformed or out of
    ///   bounds; both allow the caller to skip straight to generation
    pub async fn generate(&self, request: &CapabilityRequest) -> Result<QuestionSet> {
        let system = prompts::compose_questions_system(request.complexity, &request.target_agent)?;
        let prompt = prompts::build_questions_user_prompt(request);

        tracing::debug!(
            provider = self.agent.name(),
            complexity = %request.complexity,
            "Generating clarifying questions"
        );

        let payload = self
            .agent
            .generate_object(&system, &prompt)
            .await
            .map_err(|e| ForgeError::provider(format!("Question generation failed: {e}")))?;

        let set: QuestionSet = serde_json::from_value(payload)
            .map_err(|e| ForgeError::contract(format!("Malformed question payload: {e}")))?;

        let set = set.normalize();
        set.validate()?;

        tracing::debug!(
            questions = set.questions.len(),
            config_fields = set.config_fields.len(),
            "Accepted question set"
        );

        Ok(set)
    }
}
