//! Order side and exchange fill types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A confirmed market order fill as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange order id, also the idempotency key for book updates
    pub id: String,
    /// Executed quantity in coin units
    pub filled_qty: Decimal,
    /// Volume-weighted fill price in KRW
    pub avg_price: Decimal,
}

impl OrderResult {
    pub fn new(id: impl Into<String>, filled_qty: Decimal, avg_price: Decimal) -> Self {
        Self {
            id: id.into(),
            filled_qty,
            avg_price,
        }
    }
}
