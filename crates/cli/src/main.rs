//! docrag CLI
//!
//! Main entry point for the docrag command-line tool.
//! Ingests PDFs into a per-provider vector index and answers questions
//! grounded on them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, DocsCommand, IngestCommand, StatusCommand};
use docrag_core::{config::AppConfig, logging, AppError, AppResult, ProviderKind};
use std::path::PathBuf;
use std::process::ExitCode;

/// docrag - question answering over your own PDFs
#[derive(Parser, Debug)]
#[command(name = "docrag")]
#[command(about = "Question answering over uploaded PDF documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Embedding and generation provider (ollama, openai)
    #[arg(short, long, global = true, env = "DOCRAG_PROVIDER")]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload and index PDF files
    Ingest(IngestCommand),

    /// Ask a question about the indexed documents
    Ask(AskCommand),

    /// List, locate and delete uploaded documents
    Docs(DocsCommand),

    /// Show index and storage status
    Status(StatusCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Ask(_) => "ask",
            Commands::Docs(_) => "docs",
            Commands::Status(_) => "status",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_user_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let provider = cli
        .provider
        .as_deref()
        .map(str::parse::<ProviderKind>)
        .transpose()?;

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        provider,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.log_format, config.no_color)?;

    tracing::info!("docrag starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);

    config.validate()?;
    config.ensure_data_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Docs(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(()) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

/// Pretty-print a serializable value as JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(AppError::from)?;
    println!("{}", text);
    Ok(())
}
