//! Logging setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "upbit-trader.log";

/// Setup logging with the given level.
///
/// `RUST_LOG` takes precedence over `level`. With `file_dir`, events are also
/// written as JSON to a daily-rolling file there; keep the returned guard
/// alive or buffered lines are lost on exit.
pub fn setup_logging(level: &str, json: bool, file_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .with_current_span(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if json {
        tracing_subscriber::registry()
            .with(file_layer)
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(file_layer)
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }

    guard
}
