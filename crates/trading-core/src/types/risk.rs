//! Daily risk aggregates and the limits summary shared with collaborators.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily risk counters, reset once per trading day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Capital committed today: buy notional plus realized basis of sells
    pub daily_invested_amount: Decimal,
    /// Realized profit today
    pub daily_profit_amount: Decimal,
    /// Fills applied today
    pub daily_trade_count: u32,
    /// `daily_profit_amount / daily_invested_amount`, zero with no investment
    pub daily_return: Decimal,
}

impl RiskState {
    /// Realized daily return, zero when nothing has been invested yet.
    pub fn actual_return(&self) -> Decimal {
        if self.daily_invested_amount.is_zero() {
            Decimal::ZERO
        } else {
            self.daily_profit_amount / self.daily_invested_amount
        }
    }

    /// Apply one fill's contribution to the daily aggregates.
    pub fn apply(&mut self, invested: Decimal, profit: Decimal) {
        self.daily_invested_amount += invested;
        self.daily_profit_amount += profit;
        self.daily_trade_count += 1;
        self.daily_return = self.actual_return();
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary of the configured limits, handed to advisory services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingLimits {
    pub max_positions: usize,
    pub max_daily_profit_rate: Decimal,
    pub max_daily_loss_rate: Decimal,
    pub stop_loss_rate: Decimal,
}
