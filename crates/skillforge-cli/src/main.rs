use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "skillforge")]
#[command(about = "skillforge - build AI agent skill packages from plain-language descriptions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a capability and generate a skill package
    Generate(commands::generate::GenerateArgs),
    /// Inspect and manage saved sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Copy device-local sessions into identity-backed storage
    Migrate {
        /// Identity to migrate local sessions into
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List sessions, newest first
    List {
        #[arg(long)]
        user: Option<String>,
    },
    /// Show one session's transcript and generated package
    Show {
        id: String,
        #[arg(long)]
        user: Option<String>,
    },
    /// Delete a session
    Delete {
        id: String,
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => commands::generate::run(args).await,
        Commands::Sessions { action } => match action {
            SessionsAction::List { user } => commands::sessions::list(user.as_deref()).await,
            SessionsAction::Show { id, user } => {
                commands::sessions::show(&id, user.as_deref()).await
            }
            SessionsAction::Delete { id, user } => {
                commands::sessions::delete(&id, user.as_deref()).await
            }
        },
        Commands::Migrate { user } => commands::migrate::run(&user).await,
    }
}
