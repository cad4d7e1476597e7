//! Capability request domain model.
//!
//! A capability request is the immutable input to question generation:
//! the user's free-text description of the behavior their agent should
//! gain, plus how thorough the generated skill should be and which agent
//! it targets.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Maximum accepted length for a capability description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 10_000;

/// The default target agent when none is specified.
pub const DEFAULT_TARGET_AGENT: &str = "claude-code";

/// Agent identifiers the pipeline knows how to tailor output for.
pub const KNOWN_TARGET_AGENTS: &[&str] = &[
    "claude-code",
    "cursor",
    "openai-codex",
    "v0",
    "bolt",
    "lovable",
];

/// How thorough the generated skill should be.
///
/// `Simple` biases question recommendations and generation toward the
/// smallest workable skill; `Full` biases toward robust, defensive output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Complexity {
    #[default]
    Simple,
    Full,
}

/// Immutable input to question generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    /// Free-text description of the desired capability.
    pub description: String,
    /// Simple vs full skill preference.
    pub complexity: Complexity,
    /// Identifier of the agent the skill is generated for.
    pub target_agent: String,
}

impl CapabilityRequest {
    /// Creates a validated capability request.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when the description is empty or exceeds
    /// [`MAX_DESCRIPTION_LEN`], or when the target agent is not a known
    /// identifier.
    pub fn new(
        description: impl Into<String>,
        complexity: Complexity,
        target_agent: Option<&str>,
    ) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ForgeError::config("Capability description must not be empty"));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ForgeError::config(format!(
                "Capability description exceeds maximum length of {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        let target_agent = target_agent.unwrap_or(DEFAULT_TARGET_AGENT);
        if !KNOWN_TARGET_AGENTS.contains(&target_agent) {
            return Err(ForgeError::config(format!(
                "Unknown target agent '{}'. Known agents: {}",
                target_agent,
                KNOWN_TARGET_AGENTS.join(", ")
            )));
        }

        Ok(Self {
            description,
            complexity,
            target_agent: target_agent.to_string(),
        })
    }
}
