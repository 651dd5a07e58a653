//! Nexus - Main Entry Point
//!
//! Runs the userbot and, when a bot token is configured, the assistant bot.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

use nexus_userbot::app::NexusApp;
use nexus_userbot::config::{BOT_VERSION, Config, ConfigError, Paths};
use nexus_userbot::logging;

/// Telegram userbot with an assistant bot and plugins.
#[derive(Parser, Debug)]
#[command(name = "nexus")]
#[command(about = "Telegram userbot with an assistant bot and plugins")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log to stdout only.
    #[arg(long)]
    no_log_file: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Variables from .env must be visible before paths are derived
    let env_loaded = dotenvy::from_filename(&args.env_file);

    let paths = Paths::from_env();
    let log_dir = (!args.no_log_file).then_some(paths.logs_dir.as_path());
    // Held until exit so buffered file lines are flushed
    let _log_guard = match logging::init_logging(&args.log_level, log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = env_loaded {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(ConfigError::Invalid(_)) = e.downcast_ref::<ConfigError>() {
                eprintln!("{e}");
            }
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    info!("Starting Nexus v{} initialization...", BOT_VERSION);

    let config = Config::from_env()?;
    let summary = config.summary();
    debug!("Configuration: {:?}", summary);

    let app = NexusApp::new(config).context("Failed to initialize clients")?;
    app.run().await
}
