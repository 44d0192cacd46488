//! Logging setup and notification sinks.

mod logging;
mod notifier;

pub use logging::setup_logging;
pub use notifier::{CooldownNotifier, LogNotifier};
