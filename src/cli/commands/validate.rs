//! Validate configuration command.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use trading_config::{AppConfig, ConfigError};

use crate::cli::ValidateArgs;

pub async fn run(
    args: ValidateArgs,
    config_path: &Path,
    config: Result<AppConfig, ConfigError>,
) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = config
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Markets: {}", config.control.symbols.join(", "));
    println!("Trading interval: {}s", config.control.trading_interval_secs);
    println!("Max positions: {}", config.risk.max_positions);
    println!("Stop loss: {}%", config.risk.stop_loss_rate * Decimal::ONE_HUNDRED);
    println!(
        "Daily limits: +{}% / -{}%, {} trades",
        config.risk.max_daily_profit_rate * Decimal::ONE_HUNDRED,
        config.risk.max_daily_loss_rate * Decimal::ONE_HUNDRED,
        config.risk.max_daily_trades
    );
    match config.risk.capital_limit {
        Some(limit) => println!("Capital limit: {} KRW", limit),
        None => println!("Capital limit: none"),
    }

    if args.show {
        println!();
        print!("{}", config.to_toml_string().context("Failed to render configuration")?);
    }

    Ok(())
}
