//! Core data types for the trading system.

mod market;
mod order;
mod position;
mod risk;
mod signal;
mod trade;

pub use market::{currency_of, market_of, BalanceEntry, MarketSnapshot, QUOTE_CURRENCY};
pub use order::{OrderResult, Side};
pub use position::{Position, QUANTITY_EPSILON};
pub use risk::{RiskState, TradingLimits};
pub use signal::{Signal, SignalAction};
pub use trade::TradeRecord;
