//! Immutable record of one executed order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// One executed order, as handed to logging, notification and persistence.
///
/// Buys always carry zero profit; sells carry the realized profit of the
/// portion sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Exchange order id
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    /// Fill price
    pub price: Decimal,
    /// KRW spent (buy) or received before fees (sell)
    pub gross_amount: Decimal,
    pub fee: Decimal,
    /// Capital attributable to this trade
    pub invested_amount: Decimal,
    pub profit_amount: Decimal,
    pub profit_rate: Decimal,
    pub portfolio_value_before: Decimal,
    pub portfolio_value_after: Decimal,
    pub strategy_tags: Vec<String>,
    pub is_paper_trade: bool,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.side == Side::Sell && self.profit_amount > Decimal::ZERO
    }

    /// One-line summary used in logs and alerts.
    pub fn summary(&self) -> String {
        match self.side {
            Side::Buy => format!(
                "{} {} {} @ {} (invested {})",
                self.side,
                self.symbol,
                self.quantity.normalize(),
                self.price.normalize(),
                self.invested_amount.round_dp(0)
            ),
            Side::Sell => format!(
                "{} {} {} @ {} (profit {:+} / {:+.2}%)",
                self.side,
                self.symbol,
                self.quantity.normalize(),
                self.price.normalize(),
                self.profit_amount.round_dp(0),
                self.profit_rate * Decimal::ONE_HUNDRED
            ),
        }
    }
}
