//! Position sizing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::RiskConfig;

/// Fraction of usable balance committed to a full-confidence entry.
const BASE_FRACTION: Decimal = dec!(0.20);
/// Applied to the base fraction once two or more positions are open.
const CROWDED_FACTOR: Decimal = dec!(0.70);
/// Share of daily profit reinvested, as a fraction of usable balance.
const COMPOUND_RATE: Decimal = dec!(0.10);
/// Ceiling on the compounding boost.
const COMPOUND_CAP: Decimal = dec!(0.05);

/// Computes KRW amounts for new entries.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    max_positions: usize,
    max_position_size_fraction: Decimal,
    min_trade_amount: Decimal,
    compound_interest: bool,
    capital_limit: Option<Decimal>,
}

impl PositionSizer {
    /// Create a sizer from the risk configuration.
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            max_positions: config.max_positions,
            max_position_size_fraction: config.max_position_size_fraction,
            min_trade_amount: config.min_trade_amount,
            compound_interest: config.compound_interest,
            capital_limit: config.capital_limit,
        }
    }

    /// Balance available for sizing after the capital limit.
    fn usable_balance(&self, available_balance: Decimal) -> Decimal {
        match self.capital_limit {
            Some(limit) => available_balance.min(limit),
            None => available_balance,
        }
    }

    /// KRW amount to commit, or zero when the trade should be declined.
    ///
    /// Confidence outside `[0, 1]` is clamped.
    pub fn calculate(
        &self,
        available_balance: Decimal,
        confidence: f64,
        open_positions: usize,
        daily_profit: Decimal,
    ) -> Decimal {
        let balance = self.usable_balance(available_balance);
        if balance < self.min_trade_amount || open_positions >= self.max_positions {
            return Decimal::ZERO;
        }
        if balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let mut fraction = BASE_FRACTION;
        if open_positions >= 2 {
            fraction *= CROWDED_FACTOR;
        }

        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        let confidence = Decimal::try_from(confidence).unwrap_or_default();
        let confidence_multiplier = dec!(0.5) + confidence * dec!(0.5);

        let mut size = balance * fraction * confidence_multiplier;

        if self.compound_interest && daily_profit > Decimal::ZERO {
            let boost = (daily_profit / balance * COMPOUND_RATE).min(COMPOUND_CAP);
            size *= Decimal::ONE + boost;
        }

        let size = size.min(balance * self.max_position_size_fraction);
        if size < self.min_trade_amount {
            return Decimal::ZERO;
        }
        size
    }
}
