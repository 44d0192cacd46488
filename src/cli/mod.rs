//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upbit-trader")]
#[command(author, version, about = "Periodic KRW-market crypto trading bot")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TRADING_CONFIG", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level, overrides logging.level from the configuration
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control loop against the paper exchange and a replay feed
    Paper(PaperArgs),
    /// Validate configuration
    ValidateConfig(ValidateArgs),
}

#[derive(clap::Args)]
pub struct PaperArgs {
    /// Replay tick file (JSON), overrides paper.replay_file
    #[arg(short, long)]
    pub replay: Option<PathBuf>,

    /// Markets to trade (comma-separated), overrides control.symbols
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Initial KRW balance, overrides paper.initial_krw
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Seconds between trading passes, overrides control.trading_interval_secs
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Sell every open position before exiting
    #[arg(long)]
    pub liquidate_on_exit: bool,

    /// Also print the final status snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Print the effective configuration as TOML
    #[arg(long)]
    pub show: bool,
}
