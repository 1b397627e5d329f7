//! CLI binary for Buddy.

use buddy::audio::MicrophoneStream;
use buddy::config::{BuddyConfig, IntentStrategy};
use buddy::BuddyApp;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

/// Buddy: voice and text desktop assistant.
#[derive(Parser)]
#[command(name = "buddy", version, about)]
struct Cli {
    /// Path to TOML configuration file (created with defaults if missing).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chat from the terminal only; do not open the microphone.
    #[arg(long)]
    text_only: bool,

    /// Intent strategy: auto, remote, local or keyword.
    #[arg(long)]
    strategy: Option<IntentStrategy>,

    /// Log level or filter directive (overridden by RUST_LOG).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the assistant (default).
    Run,

    /// List microphones.
    Devices,

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(BuddyConfig::default_config_path);
    let mut config = BuddyConfig::load_or_create(&path)?;
    if let Some(strategy) = cli.strategy {
        config.intent.strategy = strategy;
    }

    let _log_guard = buddy::logging::init(&config.logging, cli.log_level.as_deref())?;
    info!(config = %path.display(), "configuration loaded");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, cli.text_only).await,
        Command::Devices => list_devices(),
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: BuddyConfig, text_only: bool) -> anyhow::Result<()> {
    let app = BuddyApp::build(config, text_only)
        .await
        .inspect_err(|e| error!("application startup failed: {e}"))?;
    app.run().await.inspect_err(|e| error!("{e}"))?;
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let devices = MicrophoneStream::list_input_devices()?;
    if devices.is_empty() {
        println!("No input devices found.");
    }
    for name in devices {
        println!("  {name}");
    }
    Ok(())
}
