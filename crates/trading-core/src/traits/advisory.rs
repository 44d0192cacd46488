//! Advisory service trait definition.

use crate::error::AdvisoryError;
use crate::types::{MarketSnapshot, Position, SignalAction, TradingLimits};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An advisory recommendation. Informational, never executed directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: SignalAction,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    /// Assessed portfolio risk in [0, 1]
    #[serde(default)]
    pub risk_score: f64,
}

impl Recommendation {
    /// Whether this recommendation vetoes a buy at the given confidence threshold.
    pub fn vetoes_buy(&self, min_confidence: f64) -> bool {
        self.action == SignalAction::Sell && self.confidence >= min_confidence
    }
}

/// Optional external advisor consulted before buys and polled for alerts.
#[async_trait]
pub trait AdvisoryService: Send + Sync {
    async fn evaluate(
        &self,
        snapshot: &MarketSnapshot,
        positions: &[Position],
        limits: &TradingLimits,
    ) -> Result<Recommendation, AdvisoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommendation(action: SignalAction, confidence: f64) -> Recommendation {
        Recommendation {
            action,
            confidence,
            reasoning: String::new(),
            risk_score: 0.0,
        }
    }

    #[test]
    fn test_vetoes_buy() {
        assert!(recommendation(SignalAction::Sell, 0.9).vetoes_buy(0.7));
        assert!(recommendation(SignalAction::Sell, 0.7).vetoes_buy(0.7));
        assert!(!recommendation(SignalAction::Sell, 0.5).vetoes_buy(0.7));
        assert!(!recommendation(SignalAction::Hold, 0.99).vetoes_buy(0.7));
    }
}
