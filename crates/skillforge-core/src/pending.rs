//! Pending-session draft model and buffer contract.
//!
//! A pending session is a durable client-side draft of a generation in
//! progress. It exists so that work started before a real session record
//! exists (anonymous generation, a reload mid-stream, an authentication
//! round-trip) is not lost. One draft exists at a time per device, held in
//! a single well-known storage slot.

use crate::question::StructuredAnswer;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A possibly-incomplete generation draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSession {
    pub id: String,
    /// The original capability description.
    pub description: String,
    /// Structured answers, when the clarification path was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_answers: Option<Vec<StructuredAnswer>>,
    /// Collected configuration values, when any fields were emitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_values: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<String>,
    /// Raw, possibly partial, completion text.
    #[serde(default)]
    pub spec: String,
    /// True once the stream completed and the draft holds a full artifact.
    #[serde(default)]
    pub is_complete: bool,
    /// Timestamp when the draft was created (ISO 8601 format).
    pub created_at: String,
    /// Timestamp of the last merge (ISO 8601 format).
    pub last_updated: String,
}

/// A partial update to the draft.
///
/// Streaming ticks only carry the fields that changed (typically `spec`
/// and `is_complete`); fields absent from a patch must retain their
/// previous value when merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PendingPatch {
    pub description: Option<String>,
    pub question_answers: Option<Vec<StructuredAnswer>>,
    pub config_values: Option<BTreeMap<String, String>>,
    pub target_agent: Option<String>,
    pub spec: Option<String>,
    pub is_complete: Option<bool>,
}

impl PendingPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn question_answers(mut self, answers: Vec<StructuredAnswer>) -> Self {
        self.question_answers = Some(answers);
        self
    }

    pub fn config_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.config_values = Some(values);
        self
    }

    pub fn target_agent(mut self, agent: impl Into<String>) -> Self {
        self.target_agent = Some(agent.into());
        self
    }

    pub fn spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = Some(spec.into());
        self
    }

    pub fn is_complete(mut self, complete: bool) -> Self {
        self.is_complete = Some(complete);
        self
    }
}

impl PendingSession {
    /// Creates a fresh draft from an initial patch.
    ///
    /// `id` is the caller-supplied draft id and `now` an RFC 3339
    /// timestamp; both are injected so storage backends stay
    /// deterministic under test.
    pub fn from_patch(id: impl Into<String>, patch: PendingPatch, now: impl Into<String>) -> Self {
        let now = now.into();
        Self {
            id: id.into(),
            description: patch.description.unwrap_or_default(),
            question_answers: patch.question_answers,
            config_values: patch.config_values,
            target_agent: patch.target_agent,
            spec: patch.spec.unwrap_or_default(),
            is_complete: patch.is_complete.unwrap_or(false),
            created_at: now.clone(),
            last_updated: now,
        }
    }

    /// Merges a patch into the draft. Fields absent from the patch keep
    /// their previous value; `last_updated` is bumped to `now`.
    pub fn apply(&mut self, patch: PendingPatch, now: impl Into<String>) {
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(answers) = patch.question_answers {
            self.question_answers = Some(answers);
        }
        if let Some(values) = patch.config_values {
            self.config_values = Some(values);
        }
        if let Some(agent) = patch.target_agent {
            self.target_agent = Some(agent);
        }
        if let Some(spec) = patch.spec {
            self.spec = spec;
        }
        if let Some(complete) = patch.is_complete {
            self.is_complete = complete;
        }
        self.last_updated = now.into();
    }
}

/// An abstract single-slot store for the pending-session draft.
///
/// `save` merges into the existing draft, creating it when absent. Only
/// one draft exists at a time per device.
#[async_trait]
pub trait PendingSessionStore: Send + Sync {
    /// Merges a patch into the draft (create-if-absent).
    async fn save(&self, patch: PendingPatch) -> Result<()>;

    /// Loads the current draft, if one exists.
    async fn load(&self) -> Result<Option<PendingSession>>;

    /// Removes the draft.
    async fn clear(&self) -> Result<()>;

    /// Returns true when a draft exists.
    async fn exists(&self) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_untouched_fields() {
        // P5: saving {spec} over {description, is_complete} keeps both.
        let mut draft = PendingSession::from_patch(
            "draft-1",
            PendingPatch::new()
                .description("Monitor a website for changes")
                .is_complete(false),
            "2025-01-01T00:00:00Z",
        );

        draft.apply(PendingPatch::new().spec("X"), "2025-01-01T00:00:05Z");

        assert_eq!(draft.description, "Monitor a website for changes");
        assert_eq!(draft.spec, "X");
        assert!(!draft.is_complete);
        assert_eq!(draft.last_updated, "2025-01-01T00:00:05Z");
        assert_eq!(draft.created_at, "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_merge_overwrites_present_fields() {
        let mut draft = PendingSession::from_patch(
            "draft-1",
            PendingPatch::new().description("d").spec("partial"),
            "2025-01-01T00:00:00Z",
        );

        draft.apply(
            PendingPatch::new().spec("partial plus more").is_complete(true),
            "2025-01-01T00:00:10Z",
        );

        assert_eq!(draft.spec, "partial plus more");
        assert!(draft.is_complete);
    }

    #[test]
    fn test_from_patch_defaults() {
        let draft = PendingSession::from_patch("id", PendingPatch::new(), "2025-01-01T00:00:00Z");
        assert_eq!(draft.description, "");
        assert_eq!(draft.spec, "");
        assert!(!draft.is_complete);
        assert!(draft.question_answers.is_none());
        assert!(draft.config_values.is_none());
    }
}
