//! AgentVerse
//!
//! Runs one episode of a named task and prints the transcript as it goes.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use verse_core::config::{DEFAULT_TASK, DEFAULT_TASKS_DIR};
use verse_core::{Orchestrator, Registries, TaskLoader, VerseError};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "agentverse")]
#[command(about = "Run a multi-agent episode from a task configuration")]
struct Args {
    /// Task to run
    #[arg(long, default_value = DEFAULT_TASK)]
    task: String,

    /// Directory searched for task files before the built-in tasks
    #[arg(long, default_value = DEFAULT_TASKS_DIR)]
    tasks_dir: PathBuf,

    /// Override the task's turn limit
    #[arg(long)]
    max_turns: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), VerseError> {
    let loader = TaskLoader::new(&args.tasks_dir);
    let mut config = loader.load(&args.task)?;
    if let Some(max_turns) = args.max_turns {
        config.environment.max_turns = Some(max_turns);
    }

    let registries = Registries::with_builtins()?;
    let mut orchestrator = Orchestrator::from_config(config, &registries)?;
    let summary = orchestrator.run().await?;

    tracing::info!(
        task = %summary.task,
        episode = %summary.episode_id,
        turns = summary.turns,
        "done"
    );
    Ok(())
}
