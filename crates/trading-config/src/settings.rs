//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trading_core::TradingError;
use trading_engine::ControlConfig;
use trading_risk::RiskConfig;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub control: ControlSettings,
    #[serde(default)]
    pub paper: PaperSettings,
    #[serde(default)]
    pub notification: NotificationSettings,
}

impl AppConfig {
    /// Check every section. Errors name the offending key.
    pub fn validate(&self) -> Result<(), TradingError> {
        self.risk.validate()?;
        self.control.validate()?;
        self.paper.validate()?;
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(TradingError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                other
            ))),
        }
    }

    /// Render as TOML, e.g. to show the effective configuration.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// General app settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "upbit-trader".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily-rolling log files
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Control loop timing and target markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub symbols: Vec<String>,
    pub trading_interval_secs: u64,
    pub advisory_interval_secs: u64,
    pub report_interval_secs: u64,
    pub drain_timeout_secs: u64,
    /// KST hour at which the trading day rolls over
    pub day_reset_hour: u32,
    pub advisory_veto_confidence: f64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        let defaults = ControlConfig::default();
        Self {
            symbols: defaults.symbols,
            trading_interval_secs: defaults.trading_interval.as_secs(),
            advisory_interval_secs: defaults.advisory_interval.as_secs(),
            report_interval_secs: defaults.report_interval.as_secs(),
            drain_timeout_secs: defaults.drain_timeout.as_secs(),
            day_reset_hour: defaults.day_reset_hour,
            advisory_veto_confidence: defaults.advisory_veto_confidence,
        }
    }
}

impl ControlSettings {
    pub fn to_control_config(&self) -> ControlConfig {
        ControlConfig {
            symbols: self.symbols.clone(),
            trading_interval: Duration::from_secs(self.trading_interval_secs),
            advisory_interval: Duration::from_secs(self.advisory_interval_secs),
            report_interval: Duration::from_secs(self.report_interval_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            day_reset_hour: self.day_reset_hour,
            advisory_veto_confidence: self.advisory_veto_confidence,
        }
    }

    fn validate(&self) -> Result<(), TradingError> {
        if self.symbols.is_empty() {
            return Err(TradingError::Config(
                "control.symbols must name at least one market".to_string(),
            ));
        }
        let intervals = [
            ("trading_interval_secs", self.trading_interval_secs),
            ("advisory_interval_secs", self.advisory_interval_secs),
            ("report_interval_secs", self.report_interval_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(TradingError::Config(format!(
                    "control.{} must be positive",
                    name
                )));
            }
        }
        if self.day_reset_hour > 23 {
            return Err(TradingError::Config(format!(
                "control.day_reset_hour must be within 0..=23, got {}",
                self.day_reset_hour
            )));
        }
        if !(0.0..=1.0).contains(&self.advisory_veto_confidence) {
            return Err(TradingError::Config(format!(
                "control.advisory_veto_confidence must be within [0, 1], got {}",
                self.advisory_veto_confidence
            )));
        }
        Ok(())
    }
}

/// Paper exchange settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub initial_krw: Decimal,
    pub fee_rate: Decimal,
    /// JSON tick file replayed as the signal source
    pub replay_file: Option<String>,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            initial_krw: dec!(1000000),
            fee_rate: dec!(0.0005),
            replay_file: None,
        }
    }
}

impl PaperSettings {
    fn validate(&self) -> Result<(), TradingError> {
        if self.initial_krw <= Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "paper.initial_krw must be positive, got {}",
                self.initial_krw
            )));
        }
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err(TradingError::Config(format!(
                "paper.fee_rate must be within [0, 1), got {}",
                self.fee_rate
            )));
        }
        Ok(())
    }
}

/// Notification throttling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub default_cooldown_secs: u64,
    pub report_cooldown_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            default_cooldown_secs: 300,
            report_cooldown_secs: 1800,
        }
    }
}

impl NotificationSettings {
    pub fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_cooldown_secs)
    }

    pub fn report_cooldown(&self) -> Duration {
        Duration::from_secs(self.report_cooldown_secs)
    }
}
