//! Trading signal types produced by the signal source.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Action requested by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
            SignalAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// A trading signal for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Market symbol
    pub symbol: String,
    /// Requested action
    pub action: SignalAction,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Reference price in KRW
    pub price: Decimal,
    /// Strategies that produced the signal
    #[serde(default)]
    pub strategy_tags: Vec<String>,
    /// When the signal was generated
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Create a new signal.
    pub fn new(
        symbol: impl Into<String>,
        action: SignalAction,
        confidence: f64,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            confidence,
            price,
            strategy_tags: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn buy(symbol: impl Into<String>, confidence: f64, price: Decimal) -> Self {
        Self::new(symbol, SignalAction::Buy, confidence, price)
    }

    pub fn sell(symbol: impl Into<String>, price: Decimal) -> Self {
        Self::new(symbol, SignalAction::Sell, 1.0, price)
    }

    /// Attach strategy tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strategy_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Confidence clamped into [0, 1]; NaN counts as zero.
    pub fn clamped_confidence(&self) -> f64 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}
