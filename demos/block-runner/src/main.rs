//! Block Runner
//!
//! Loads a blockbot configuration, registers the bots it lists and runs them
//! until Ctrl+C.
//!
//! ```toml
//! [telegram]
//! poll_timeout_secs = 30
//!
//! [[bots]]
//! id = "greeter"
//! name = "Greeter"
//! token = "123456:ABC..."
//! blocks = [
//!     { id = "b1", type = "start", data = { message = "Hello!" } },
//!     { id = "b2", type = "message", data = { trigger = "price", response = "10 EUR" } },
//! ]
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package block-runner -- --config blockbot.toml
//! cargo run --package block-runner -- --config blockbot.toml check
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use blockbot::core::BoxedTransport;
use blockbot::prelude::*;
use blockbot::runtime::logging;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file. Without it the standard locations are searched.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production).
    #[arg(short, long)]
    profile: Option<String>,

    /// Use the in-memory transport instead of Telegram.
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start every configured bot and run until Ctrl+C (default).
    Run,
    /// Compile every configured bot and print its handlers as JSON.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let config = loader.load().context("failed to load configuration")?;

    logging::init_from_config(&config.logging);

    let transport: BoxedTransport = if cli.memory {
        Arc::new(MemoryTransport::new())
    } else {
        Arc::new(
            TelegramTransport::new(config.telegram.api_base.clone())
                .with_poll_timeout(Duration::from_secs(config.telegram.poll_timeout_secs)),
        )
    };

    let repository = Arc::new(InMemoryBotRepository::new());
    let manager = InstanceManager::new(repository, transport, config.manager.clone());
    for bot in config.bots {
        manager.register(bot).await?;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Check => check(&manager).await,
        Command::Run => run(&manager).await,
    }
}

async fn check(manager: &InstanceManager) -> Result<()> {
    let mut report = serde_json::Map::new();
    for bot in manager.list().await? {
        let compilation = manager.preview(&bot.id).await?;
        report.insert(
            bot.id,
            serde_json::json!({
                "handlers": compilation.handlers.summaries(),
                "warnings": compilation.warnings,
            }),
        );
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(manager: &InstanceManager) -> Result<()> {
    let bots = manager.list().await?;
    if bots.is_empty() {
        bail!("no bots configured");
    }

    let mut started = 0;
    for bot in &bots {
        match manager.start(&bot.id).await {
            Ok(()) => started += 1,
            Err(e) => error!(bot_id = %bot.id, error = %e, "Failed to start bot"),
        }
    }
    if started == 0 {
        bail!("none of the {} configured bots started", bots.len());
    }
    info!(started, configured = bots.len(), "Bots running, press Ctrl+C to stop");

    let errors = manager.run_until_ctrl_c().await;
    if !errors.is_empty() {
        warn!(count = errors.len(), "Some bots did not stop cleanly");
    }
    Ok(())
}
