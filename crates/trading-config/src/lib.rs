//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, ControlSettings, LoggingConfig, NotificationSettings, PaperSettings,
};

pub use config::ConfigError;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use std::path::Path;

/// Load configuration from file and environment, then validate it.
///
/// Environment variables override the file, e.g.
/// `TRADING__RISK__STOP_LOSS_RATE=0.03`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    build(Config::builder().add_source(File::from(path).required(true)))
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = builder
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;
    Ok(config)
}
