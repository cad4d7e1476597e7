//! Skill generation engine.
//!
//! One engine drives one conversation. Each turn opens a single token
//! stream against the selected generation backend, accumulates tokens
//! into a growing string, and exposes prefix-safe snapshots to an
//! observer while streaming. On completion the final string is parsed
//! once more, authoritatively, into the settled `{message, files}`
//! artifact.
//!
//! Turn lifecycle: `Idle -> Streaming -> Settled(success | error)`. Only
//! one stream may be open at a time; a failed or cancelled turn leaves
//! the transcript and the last settled artifact untouched, so the same
//! turn can be re-submitted whole.

use crate::prompts;
use async_trait::async_trait;
use futures::StreamExt;
use skillforge_core::artifact::{GenerationTurn, ParsedResponse, TurnRole};
use skillforge_core::capability::{CapabilityRequest, Complexity};
use skillforge_core::error::{ForgeError, Result};
use skillforge_core::question::{ClarifyingQuestion, StructuredAnswer};
use skillforge_core::wire;
use skillforge_interaction::{
    ChatMessage, CompletionRequest, GenerationAgent, ModelSelector,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of the last settled turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    Success,
    Error(String),
}

/// The conversation channel state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Streaming,
    Settled(TurnResult),
}

/// One generation turn's input, by scenario.
pub enum TurnInput {
    /// Initial turn driven by structured answers from the question flow.
    FromAnswers {
        request: CapabilityRequest,
        answers: Vec<(ClarifyingQuestion, StructuredAnswer)>,
        config_values: Option<BTreeMap<String, String>>,
    },
    /// Initial turn with no clarification path taken.
    Raw { request: CapabilityRequest },
    /// Free-text feedback against the last settled artifact.
    Refinement { feedback: String },
}

/// The last fully-parsed, stream-complete artifact of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledArtifact {
    /// Raw text of the file package (post-delimiter), fed back to the
    /// model on refinement turns.
    pub raw_package: String,
    pub parsed: ParsedResponse,
}

/// A prefix-safe view of the in-flight completion.
#[derive(Debug, Clone, Copy)]
pub struct StreamSnapshot<'a> {
    /// Everything received so far.
    pub raw: &'a str,
    /// The conversational message part (whole text until the delimiter
    /// arrives).
    pub message: &'a str,
    /// The package part, once the delimiter has been seen.
    pub package: Option<&'a str>,
    /// True exactly once, on the final post-settle snapshot.
    pub is_complete: bool,
}

/// Receives progress snapshots while a turn streams.
#[async_trait]
pub trait StreamObserver: Send {
    async fn on_progress(&mut self, snapshot: StreamSnapshot<'_>);
}

/// Observer that ignores all progress.
pub struct NullObserver;

#[async_trait]
impl StreamObserver for NullObserver {
    async fn on_progress(&mut self, _snapshot: StreamSnapshot<'_>) {}
}

struct RequestContext {
    complexity: Complexity,
    target_agent: String,
    config_values: Option<BTreeMap<String, String>>,
}

/// The conversational generation state machine.
pub struct GenerationEngine {
    agent: Arc<dyn GenerationAgent>,
    state: ChannelState,
    transcript: Vec<GenerationTurn>,
    settled: Option<SettledArtifact>,
    context: Option<RequestContext>,
    cancel: CancellationToken,
    max_tokens: u32,
}

impl GenerationEngine {
    /// Creates an engine over an explicit generation agent.
    pub fn new(agent: Arc<dyn GenerationAgent>) -> Self {
        Self {
            agent,
            state: ChannelState::Idle,
            transcript: Vec::new(),
            settled: None,
            context: None,
            cancel: CancellationToken::new(),
            max_tokens: 4096,
        }
    }

    /// Creates an engine by selecting the generation backend once.
    ///
    /// # Errors
    ///
    /// Propagates the selector's fatal `Config` error when no
    /// generation provider is configured.
    pub fn from_selector(selector: &ModelSelector) -> Result<Self> {
        Ok(Self::new(selector.select_generation()?))
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    /// The conversation transcript, oldest turn first.
    pub fn transcript(&self) -> &[GenerationTurn] {
        &self.transcript
    }

    /// The last settled artifact, if any turn has completed.
    pub fn settled(&self) -> Option<&SettledArtifact> {
        self.settled.as_ref()
    }

    /// Returns a handle that cancels the current (or next) turn's stream.
    /// Cancellation is observed between token deliveries; tokens already
    /// delivered to the observer stay visible.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one generation turn to settlement.
    ///
    /// # Errors
    ///
    /// - `Internal` when a turn is already in flight, when an initial
    ///   input arrives on a started conversation, or when a refinement
    ///   arrives with nothing settled to refine
    /// - `Provider` when the backend or stream fails; the transcript and
    ///   settled artifact are left untouched and the same turn may be
    ///   re-submitted
    /// - `Cancelled` when the consumer cancelled mid-stream
    pub async fn submit(
        &mut self,
        input: TurnInput,
        observer: &mut dyn StreamObserver,
    ) -> Result<ParsedResponse> {
        if self.state == ChannelState::Streaming {
            return Err(ForgeError::internal(
                "A generation turn is already in flight for this conversation",
            ));
        }

        let turn = self.build_turn(input)?;
        self.state = ChannelState::Streaming;

        let result = self.run_stream(&turn, observer).await;
        // A fresh token per turn: a cancel aimed at this turn must not
        // leak into the next one.
        self.cancel = CancellationToken::new();

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                self.state = ChannelState::Settled(TurnResult::Error(e.to_string()));
                return Err(e);
            }
        };

        if let Some(context) = turn.new_context {
            self.context = Some(context);
        }

        let parsed = wire::parse_completion(&raw);
        self.warn_on_surviving_placeholders(&parsed);

        let (_, package) = wire::split_message(&raw);
        let raw_package = package.unwrap_or(raw.as_str()).trim().to_string();

        self.transcript.push(GenerationTurn {
            role: TurnRole::User,
            content: turn.transcript_content,
        });
        self.transcript
            .push(GenerationTurn::assistant(parsed.message.clone()));
        self.settled = Some(SettledArtifact {
            raw_package,
            parsed: parsed.clone(),
        });
        self.state = ChannelState::Settled(TurnResult::Success);

        let (message, package) = wire::split_message(&raw);
        observer
            .on_progress(StreamSnapshot {
                raw: &raw,
                message: message.trim(),
                package,
                is_complete: true,
            })
            .await;

        Ok(parsed)
    }

    fn build_turn(&self, input: TurnInput) -> Result<PreparedTurn> {
        match input {
            TurnInput::FromAnswers {
                request,
                answers,
                config_values,
            } => {
                self.ensure_fresh_conversation()?;
                let resolved: Vec<(String, String)> = answers
                    .iter()
                    .map(|(question, answer)| {
                        (question.question.clone(), answer.resolve(question))
                    })
                    .collect();
                let system = prompts::compose_generation_system(
                    request.complexity,
                    &request.target_agent,
                    None,
                    config_values.as_ref(),
                )?;
                let user_prompt = prompts::build_answers_turn_prompt(
                    &request.description,
                    &resolved,
                    config_values.as_ref(),
                );
                Ok(PreparedTurn {
                    system,
                    transcript_content: user_prompt.clone(),
                    user_prompt,
                    new_context: Some(RequestContext {
                        complexity: request.complexity,
                        target_agent: request.target_agent,
                        config_values,
                    }),
                })
            }
            TurnInput::Raw { request } => {
                self.ensure_fresh_conversation()?;
                let system = prompts::compose_generation_system(
                    request.complexity,
                    &request.target_agent,
                    None,
                    None,
                )?;
                let user_prompt = prompts::build_raw_turn_prompt(&request.description);
                let transcript_content = request.description.clone();
                Ok(PreparedTurn {
                    system,
                    user_prompt,
                    transcript_content,
                    new_context: Some(RequestContext {
                        complexity: request.complexity,
                        target_agent: request.target_agent,
                        config_values: None,
                    }),
                })
            }
            TurnInput::Refinement { feedback } => {
                let context = self.context.as_ref().ok_or_else(|| {
                    ForgeError::internal("Refinement requires an initial turn first")
                })?;
                let settled = self.settled.as_ref().ok_or_else(|| {
                    ForgeError::internal("Refinement requires a settled artifact")
                })?;
                let system = prompts::compose_generation_system(
                    context.complexity,
                    &context.target_agent,
                    Some(&settled.raw_package),
                    context.config_values.as_ref(),
                )?;
                let user_prompt = prompts::build_refinement_turn_prompt(&feedback);
                Ok(PreparedTurn {
                    system,
                    user_prompt,
                    transcript_content: feedback,
                    new_context: None,
                })
            }
        }
    }

    fn ensure_fresh_conversation(&self) -> Result<()> {
        if self.context.is_some() || !self.transcript.is_empty() {
            return Err(ForgeError::internal(
                "Initial input on a conversation that has already started",
            ));
        }
        Ok(())
    }

    async fn run_stream(
        &self,
        turn: &PreparedTurn,
        observer: &mut dyn StreamObserver,
    ) -> Result<String> {
        let mut messages: Vec<ChatMessage> = self
            .transcript
            .iter()
            .map(|t| match t.role {
                TurnRole::User => ChatMessage::user(t.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(t.content.clone()),
            })
            .collect();
        messages.push(ChatMessage::user(turn.user_prompt.clone()));

        let request =
            CompletionRequest::new(turn.system.clone(), messages).with_max_tokens(self.max_tokens);

        tracing::debug!(provider = self.agent.name(), "Opening generation stream");

        let mut stream = self
            .agent
            .stream(request)
            .await
            .map_err(|e| ForgeError::provider(e.to_string()))?;

        let mut accumulated = String::new();
        while let Some(item) = stream.next().await {
            if self.cancel.is_cancelled() {
                tracing::debug!("Generation cancelled by consumer");
                return Err(ForgeError::Cancelled);
            }
            let token = item.map_err(|e| ForgeError::provider(e.to_string()))?;
            accumulated.push_str(&token);

            let (message, package) = wire::split_message(&accumulated);
            observer
                .on_progress(StreamSnapshot {
                    raw: &accumulated,
                    message: message.trim(),
                    package,
                    is_complete: false,
                })
                .await;
        }

        Ok(accumulated)
    }

    fn warn_on_surviving_placeholders(&self, parsed: &ParsedResponse) {
        let Some(context) = &self.context else { return };
        let Some(values) = &context.config_values else {
            return;
        };
        for field_id in values.keys() {
            for file in &parsed.files {
                if wire::contains_placeholder(&file.content, field_id) {
                    tracing::warn!(
                        field = field_id.as_str(),
                        file = file.path.as_str(),
                        "Generated file contains a placeholder for a supplied config value"
                    );
                }
            }
        }
    }
}

struct PreparedTurn {
    system: String,
    user_prompt: String,
    /// What the transcript records for this user turn: the description
    /// for a raw turn, the synthetic answers prompt for an answers-driven
    /// turn, the feedback text for a refinement.
    transcript_content: String,
    /// Conversation context an initial turn establishes. Committed only
    /// on settlement so a failed initial turn can be retried whole.
    new_context: Option<RequestContext>,
}
