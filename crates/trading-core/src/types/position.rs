//! Open position type with average cost-basis bookkeeping.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Quantities closer than this are treated as equal (exchange precision).
pub const QUANTITY_EPSILON: Decimal = dec!(0.00000001);

/// An open, averaged long holding in one market.
///
/// `average_price == total_invested / quantity` after every mutation, and a
/// position only exists while `quantity > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Market symbol, e.g. `KRW-BTC`
    pub symbol: String,
    /// Invested-amount-weighted mean fill price
    pub average_price: Decimal,
    /// Coin quantity held
    pub quantity: Decimal,
    /// Fee-exclusive KRW committed to the remaining quantity
    pub total_invested: Decimal,
    /// Time of the first fill
    pub entry_time: DateTime<Utc>,
    /// Time of the most recent buy
    pub last_buy_time: DateTime<Utc>,
    /// Liquidation threshold derived from the current average price
    pub stop_loss_price: Decimal,
    /// Exchange ids of every buy merged into this position, oldest first
    pub buy_order_ids: Vec<String>,
}

impl Position {
    /// Create a position from its first fill.
    pub fn open(
        symbol: impl Into<String>,
        quantity: Decimal,
        invested: Decimal,
        price: Decimal,
        order_id: impl Into<String>,
        now: DateTime<Utc>,
        stop_loss_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            average_price: price,
            quantity,
            total_invested: invested,
            entry_time: now,
            last_buy_time: now,
            stop_loss_price,
            buy_order_ids: vec![order_id.into()],
        }
    }

    /// Merge an additional buy fill, re-averaging the cost basis.
    ///
    /// The owner re-derives `stop_loss_price` from the new average.
    pub fn add_fill(
        &mut self,
        quantity: Decimal,
        invested: Decimal,
        order_id: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.quantity += quantity;
        self.total_invested += invested;
        self.average_price = self.total_invested / self.quantity;
        self.last_buy_time = now;
        self.buy_order_ids.push(order_id.into());
    }

    /// Remove a pro-rata slice. The average price of the remainder is unchanged.
    pub fn reduce(&mut self, quantity: Decimal, invested: Decimal) {
        self.quantity -= quantity;
        self.total_invested -= invested;
    }

    /// Market value at the given price.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }

    /// Unrealized profit at the given price, fee excluded.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        self.market_value(price) - self.total_invested
    }

    /// Unrealized return on invested capital at the given price.
    pub fn unrealized_return(&self, price: Decimal) -> Decimal {
        if self.total_invested.is_zero() {
            return Decimal::ZERO;
        }
        self.unrealized_pnl(price) / self.total_invested
    }

    /// Whether `quantity` is the whole position, within exchange precision.
    pub fn is_whole(&self, quantity: Decimal) -> bool {
        (self.quantity - quantity).abs() <= QUANTITY_EPSILON
    }
}
