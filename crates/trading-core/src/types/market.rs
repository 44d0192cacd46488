//! Market naming helpers and the aggregate snapshot handed to advisory services.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::RiskState;

/// Quote currency of every traded market.
pub const QUOTE_CURRENCY: &str = "KRW";

/// Extract the coin currency from a market symbol (`KRW-BTC` -> `BTC`).
///
/// Symbols without a quote prefix are returned unchanged.
pub fn currency_of(symbol: &str) -> &str {
    symbol
        .split_once('-')
        .map(|(_, currency)| currency)
        .unwrap_or(symbol)
}

/// Build the KRW market symbol for a coin currency (`BTC` -> `KRW-BTC`).
pub fn market_of(currency: &str) -> String {
    format!("{}-{}", QUOTE_CURRENCY, currency)
}

/// A single currency balance held on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub currency: String,
    pub amount: Decimal,
}

impl BalanceEntry {
    pub fn new(currency: impl Into<String>, amount: Decimal) -> Self {
        Self {
            currency: currency.into(),
            amount,
        }
    }

    pub fn is_quote(&self) -> bool {
        self.currency == QUOTE_CURRENCY
    }
}

/// Aggregate view of the book and market, built for advisory evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    /// Number of symbols the bot is watching
    pub total_symbols: usize,
    /// Number of open positions
    pub active_positions: usize,
    /// Last known prices for watched symbols
    pub prices: HashMap<String, Decimal>,
    /// Unrealized return per open position
    pub unrealized_returns: HashMap<String, Decimal>,
    /// Daily risk counters at snapshot time
    pub risk: RiskState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_of() {
        assert_eq!(currency_of("KRW-BTC"), "BTC");
        assert_eq!(currency_of("KRW-ETH"), "ETH");
        assert_eq!(currency_of("XRP"), "XRP");
    }

    #[test]
    fn test_market_of() {
        assert_eq!(market_of("SOL"), "KRW-SOL");
        assert_eq!(currency_of(&market_of("SOL")), "SOL");
    }

    #[test]
    fn test_balance_entry_quote() {
        assert!(BalanceEntry::new("KRW", dec!(1000)).is_quote());
        assert!(!BalanceEntry::new("BTC", dec!(0.1)).is_quote());
    }
}
