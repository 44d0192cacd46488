//! Stop-loss management.

use rust_decimal::Decimal;
use trading_core::types::Position;

/// Derives and evaluates stop-loss thresholds from the average cost basis.
#[derive(Debug, Clone)]
pub struct StopLossManager {
    stop_loss_rate: Decimal,
}

impl StopLossManager {
    pub fn new(stop_loss_rate: Decimal) -> Self {
        Self { stop_loss_rate }
    }

    /// Stop price for a position averaged at `average_price`.
    pub fn stop_price(&self, average_price: Decimal) -> Decimal {
        average_price * (Decimal::ONE - self.stop_loss_rate)
    }

    /// Check against the position's current stop, which follows averaging buys.
    pub fn is_triggered(&self, position: &Position, current_price: Decimal) -> bool {
        current_price <= position.stop_loss_price
    }
}
