//! Upbit trading bot CLI application.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use trading_config::load_config;
use trading_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging comes up before validation so config errors are logged too.
    let config = load_config(&cli.config);
    let logging = config.as_ref().ok().map(|c| c.logging.clone()).unwrap_or_default();

    let log_level = match cli.log_level {
        Some(level) => level.as_str().to_string(),
        None => logging.level.clone(),
    };
    let json = cli.json_logs || logging.format == "json";
    let _log_guard = setup_logging(&log_level, json, logging.file.as_deref().map(Path::new));

    match cli.command {
        Commands::Paper(args) => cli::commands::paper::run(args, &cli.config, config).await,
        Commands::ValidateConfig(args) => {
            cli::commands::validate::run(args, &cli.config, config).await
        }
    }
}
