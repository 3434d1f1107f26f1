//! eventcast - YouTube event tooling
//!
//! Main entry point for the eventcast CLI.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use eventcast_config::LoggingConfig;

mod commands;

use commands::{auth, config};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// eventcast - YouTube event tooling
#[derive(Parser)]
#[command(name = "eventcast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml, credentials.json and tokens.json
    /// [default: $EVENTCAST_CONFIG_DIR, then the platform config directory]
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authentication management
    Auth(auth::AuthArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = eventcast_config::resolve_config_dir(cli.config_dir.as_deref())?;
    let loaded = eventcast_config::load(config_dir, &std::env::current_dir()?);

    let _guard = init_tracing(cli.verbose, &loaded.config.logging(), &loaded.log_dir());

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    // Create context for commands
    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console (human-readable, stderr) plus an optional daily-rotating JSON file.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(
    verbose: bool,
    logging: &LoggingConfig,
    log_dir: &Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let console_filter = match (&logging.level, verbose) {
        (_, true) => "eventcast=debug,eventcast_oauth=debug,eventcast_config=debug,info".to_string(),
        (Some(level), false) => level.clone(),
        (None, false) => "eventcast=info,eventcast_oauth=info,warn".to_string(),
    };

    let (file_layer, guard) = if logging.file {
        let file_appender = tracing_appender::rolling::daily(log_dir, "eventcast.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(
                "eventcast=trace,eventcast_oauth=trace,eventcast_config=trace,info",
            ));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(console_filter)),
        )
        .with(file_layer)
        .init();

    guard
}
