//! The full generation flow: describe, clarify, configure, stream,
//! persist, refine.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use skillforge_application::{
    GenerationEngine, PendingAutosave, QuestionService, SessionPatch, StreamObserver,
    StreamSnapshot, TurnInput,
};
use skillforge_core::capability::{CapabilityRequest, Complexity};
use skillforge_core::config_form::ConfigForm;
use skillforge_core::pending::{PendingPatch, PendingSessionStore};
use skillforge_core::question::{
    ClarifyingQuestion, ConfigField, QuestionSet, StructuredAnswer,
};
use skillforge_core::session::Identity;
use skillforge_interaction::{ModelSelector, SecretConfig};
use skillforge_infrastructure::FilePendingSessionStore;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Args)]
pub struct GenerateArgs {
    /// The capability to build a skill for; prompted for when omitted
    #[arg(long)]
    pub description: Option<String>,

    /// Skill thoroughness: simple or full
    #[arg(long, default_value = "simple")]
    pub complexity: String,

    /// Target agent identifier (defaults to claude-code)
    #[arg(long)]
    pub target_agent: Option<String>,

    /// Skip the clarifying-question flow
    #[arg(long)]
    pub skip_questions: bool,

    /// Identity to save the session under; device-local when omitted
    #[arg(long)]
    pub user: Option<String>,

    /// Accept every recommended answer and skip optional prompts
    #[arg(long)]
    pub yes: bool,
}

pub async fn run(args: GenerateArgs) -> Result<()> {
    let secrets = SecretConfig::discover().map_err(|e| anyhow::anyhow!(e))?;
    let selector = ModelSelector::from_secrets(&secrets);
    let service = super::session_service()?;
    let buffer = Arc::new(FilePendingSessionStore::default_location()?);
    let identity = args.user.as_deref().map(Identity::new);

    // Authentication transition: sweep device-local sessions into the
    // identity store (guarded no-op when local storage is empty).
    if let Some(identity) = &identity {
        service.migrate_local_to_identity(identity).await?;
    }

    // A completed draft left by an earlier run (e.g. before the user
    // authenticated) is promoted before new work starts.
    if let Some(pending) = buffer.load().await? {
        if pending.is_complete {
            let session = service
                .promote_pending(identity.as_ref(), &pending, buffer.as_ref())
                .await?;
            println!(
                "Recovered a finished draft into session {} ({}).",
                session.id, session.title
            );
        }
    }

    let description = match args.description {
        Some(description) => description,
        None => prompt("Describe the capability your agent should gain:\n> ")?,
    };
    let complexity = Complexity::from_str(args.complexity.trim())
        .map_err(|_| anyhow::anyhow!("Invalid complexity '{}': use simple or full", args.complexity))?;
    let request = CapabilityRequest::new(description, complexity, args.target_agent.as_deref())?;

    // Clarify. Contract violations and provider failures degrade to the
    // no-questions path; a missing provider is fatal.
    let question_set = if args.skip_questions {
        QuestionSet::default()
    } else {
        match generate_questions(&selector, &request).await {
            Ok(set) => set,
            Err(e) if e.is_recoverable_by_skipping_questions() => {
                eprintln!("Could not generate clarifying questions ({e}); continuing without them.");
                QuestionSet::default()
            }
            Err(e) => return Err(e.into()),
        }
    };

    let answers: Vec<(ClarifyingQuestion, StructuredAnswer)> = question_set
        .questions
        .iter()
        .map(|question| {
            let answer = ask_question(question, args.yes)?;
            Ok((question.clone(), answer))
        })
        .collect::<Result<_>>()?;

    let config_values = collect_config(question_set.config_fields.clone(), args.yes)?;

    // Seed the pending draft with everything known before streaming.
    let mut seed = PendingPatch::new()
        .description(request.description.clone())
        .target_agent(request.target_agent.clone());
    if !answers.is_empty() {
        seed = seed.question_answers(answers.iter().map(|(_, a)| a.clone()).collect());
    }
    if let Some(values) = &config_values {
        seed = seed.config_values(values.clone());
    }

    // A new generation owns the single pending slot; drop any stale,
    // incomplete draft from an earlier run before the first snapshot.
    buffer.clear().await?;

    let mut engine = GenerationEngine::from_selector(&selector)?;
    let mut observer = PrintingObserver::new(PendingAutosave::new(buffer.clone(), seed));

    let input = if answers.is_empty() {
        TurnInput::Raw {
            request: request.clone(),
        }
    } else {
        TurnInput::FromAnswers {
            request: request.clone(),
            answers,
            config_values,
        }
    };

    println!("\nGenerating skill package...\n");
    let parsed = engine.submit(input, &mut observer).await?;
    println!();

    let raw_spec = engine
        .settled()
        .map(|settled| settled.raw_package.clone())
        .unwrap_or_default();
    let mut session = service
        .create(
            identity.as_ref(),
            request.description.clone(),
            Some(raw_spec),
            Some(engine.transcript().to_vec()),
        )
        .await?;
    if let Err(e) = buffer.clear().await {
        tracing::warn!("Failed to clear pending draft after save: {}", e);
    }

    print_file_summary(&parsed.files);

    // Refinement loop: each turn carries the full transcript and the
    // last settled package.
    loop {
        let feedback = prompt("\nRefine the skill (empty line to finish):\n> ")?;
        if feedback.trim().is_empty() {
            break;
        }

        let mut observer = PrintingObserver::new(PendingAutosave::new(
            buffer.clone(),
            PendingPatch::new().description(request.description.clone()),
        ));
        println!();
        match engine
            .submit(TurnInput::Refinement { feedback }, &mut observer)
            .await
        {
            Ok(parsed) => {
                println!();
                let raw_spec = engine
                    .settled()
                    .map(|settled| settled.raw_package.clone())
                    .unwrap_or_default();
                session = service
                    .update(
                        identity.as_ref(),
                        &session.id,
                        SessionPatch::new()
                            .spec(raw_spec)
                            .messages(engine.transcript().to_vec()),
                    )
                    .await?;
                if let Err(e) = buffer.clear().await {
                    tracing::warn!("Failed to clear pending draft after save: {}", e);
                }
                print_file_summary(&parsed.files);
            }
            Err(e) => {
                eprintln!("\nSomething went wrong ({e}). The previous package is untouched; try again.");
            }
        }
    }

    println!("\nSaved session {} ({}).", session.id, session.title);
    Ok(())
}

async fn generate_questions(
    selector: &ModelSelector,
    request: &CapabilityRequest,
) -> skillforge_core::error::Result<QuestionSet> {
    let service = QuestionService::from_selector(selector)?;
    service.generate(request).await
}

fn ask_question(question: &ClarifyingQuestion, assume_yes: bool) -> Result<StructuredAnswer> {
    if assume_yes {
        return Ok(StructuredAnswer::choice(
            &question.id,
            question.recommended_index,
        ));
    }

    println!("\n{}", question.question);
    for (index, option) in question.options.iter().enumerate() {
        let marker = if index == question.recommended_index {
            "  (recommended)"
        } else {
            ""
        };
        println!("  {}) {}{}", index + 1, option, marker);
    }
    println!("  o) Other (free text)");

    loop {
        let line = prompt("> ")?;
        let line = line.trim();
        if line.is_empty() {
            return Ok(StructuredAnswer::choice(
                &question.id,
                question.recommended_index,
            ));
        }
        if line.eq_ignore_ascii_case("o") {
            let text = prompt("Your answer: ")?;
            return Ok(StructuredAnswer::free_text(&question.id, text.trim()));
        }
        if let Ok(number) = line.parse::<usize>() {
            if (1..=question.options.len()).contains(&number) {
                return Ok(StructuredAnswer::choice(&question.id, number - 1));
            }
        }
        println!("Enter 1-{}, 'o', or leave empty for the recommendation.", question.options.len());
    }
}

fn collect_config(
    fields: Vec<ConfigField>,
    assume_yes: bool,
) -> Result<Option<BTreeMap<String, String>>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let mut form = ConfigForm::new(fields);
    if assume_yes && form.can_skip() {
        return Ok(None);
    }

    println!("\nThis skill needs a few values:");
    let ordered: Vec<ConfigField> = form.ordered_fields().into_iter().cloned().collect();
    for field in &ordered {
        if let Some(description) = &field.description {
            println!("\n{} - {}", field.label, description);
        } else {
            println!("\n{}", field.label);
        }
        loop {
            let suffix = if field.required { "" } else { " (optional)" };
            let value = prompt(&format!("{}{} [{}]: ", field.id, suffix, field.placeholder))?;
            form.set_value(&field.id, value.trim());
            match form.validate_field(field) {
                Ok(()) => break,
                Err(e) => println!("  {}", e),
            }
        }
    }

    match form.submit() {
        Ok(values) if values.is_empty() => Ok(None),
        Ok(values) => Ok(Some(values)),
        Err(errors) => {
            // Unreachable after the per-field loop, but surface it
            // rather than panic if a validator disagrees with itself.
            anyhow::bail!("Configuration incomplete: {:?}", errors)
        }
    }
}

fn print_file_summary(files: &[skillforge_core::artifact::SkillFile]) {
    println!("Generated {} file(s):", files.len());
    for file in files {
        println!("  {} ({} bytes)", file.path, file.content.len());
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Prints the stream to stdout as it arrives and forwards every snapshot
/// to the pending-session autosave.
struct PrintingObserver {
    autosave: PendingAutosave,
    printed: usize,
}

impl PrintingObserver {
    fn new(autosave: PendingAutosave) -> Self {
        Self {
            autosave,
            printed: 0,
        }
    }
}

#[async_trait]
impl StreamObserver for PrintingObserver {
    async fn on_progress(&mut self, snapshot: StreamSnapshot<'_>) {
        if snapshot.raw.len() > self.printed {
            print!("{}", &snapshot.raw[self.printed..]);
            let _ = io::stdout().flush();
            self.printed = snapshot.raw.len();
        }
        self.autosave.on_progress(snapshot).await;
    }
}
