//! Paper trading command implementation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use trading_broker::{PaperExchange, ReplayFeed};
use trading_config::{AppConfig, ConfigError};
use trading_core::traits::{NotificationKind, NotificationSink};
use trading_engine::{ControlLoop, RunState, SharedBook};
use trading_monitor::{CooldownNotifier, LogNotifier};

use crate::cli::PaperArgs;

/// How often the command checks for a halt or an exhausted feed.
const WATCH_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run(
    args: PaperArgs,
    config_path: &Path,
    config: Result<AppConfig, ConfigError>,
) -> Result<()> {
    let mut config = config
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    if !args.symbols.is_empty() {
        config.control.symbols = args.symbols.clone();
    }
    if let Some(capital) = args.capital {
        config.paper.initial_krw = capital;
    }
    if let Some(secs) = args.interval_secs {
        config.control.trading_interval_secs = secs;
    }
    config.validate().context("Invalid configuration after overrides")?;

    let replay_path = args
        .replay
        .clone()
        .or_else(|| config.paper.replay_file.as_ref().map(PathBuf::from))
        .context("No replay file: pass --replay or set paper.replay_file")?;

    let exchange = Arc::new(
        PaperExchange::new(config.paper.initial_krw).with_fee_rate(config.paper.fee_rate),
    );
    let feed = Arc::new(
        ReplayFeed::from_path(&replay_path)
            .with_context(|| format!("Failed to load replay file {}", replay_path.display()))?
            .with_exchange(exchange.clone()),
    );
    let unknown: Vec<&String> = feed
        .symbols()
        .iter()
        .filter(|s| !config.control.symbols.contains(s))
        .collect();
    if !unknown.is_empty() {
        warn!(symbols = ?unknown, "Replay ticks for markets that are not traded");
    }

    let notifier: Arc<dyn NotificationSink> = Arc::new(
        CooldownNotifier::new(Arc::new(LogNotifier), config.notification.default_cooldown())
            .with_cooldown(NotificationKind::Report, config.notification.report_cooldown()),
    );

    let control = ControlLoop::new(
        config.control.to_control_config(),
        SharedBook::new(config.risk.clone()),
        exchange.clone(),
        feed.clone(),
        notifier,
        None,
    );
    control
        .start()
        .await
        .context("Failed to start the control loop")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut watch = tokio::time::interval(WATCH_INTERVAL);
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown requested");
                break;
            }
            _ = watch.tick() => {
                if control.state() == RunState::Stopped {
                    warn!("Control loop halted");
                    break;
                }
                if feed.is_exhausted().await {
                    info!("Replay feed exhausted");
                    break;
                }
            }
        }
    }

    control.stop().await;

    if args.liquidate_on_exit {
        let report = control.emergency_sell_all().await;
        if !report.is_clean() {
            for (symbol, e) in &report.failures {
                error!(symbol = %symbol, error = %e, "Position left open");
            }
        }
    }

    let status = control.status().await;
    println!("{}", control.report().await.render());
    if let Some(reason) = &status.halt_reason {
        println!("Halted: {}", reason);
    }
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to serialize status")?
        );
    }

    Ok(())
}
