//! Error types for the trading system.
//!
//! Errors are split by how the caller is expected to react:
//! - [`LedgerError`]: programming/data errors, fatal to the single operation
//! - [`ExchangeError`]: transient collaborator failures, retried next pass
//! - [`ExecutionError::NoTrade`]: a declined trade, not a failure at all
//! - [`ControlError`]: lifecycle misuse surfaced to the caller

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Position ledger errors. The ledger is left untouched when one is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invalid fill for {symbol}: quantity {quantity}, invested {invested}")]
    InvalidFill {
        symbol: String,
        quantity: Decimal,
        invested: Decimal,
    },

    #[error("No open position for {0}")]
    NoPosition(String),

    #[error("Over-sell on {symbol}: requested {requested}, held {held}")]
    OverSell {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },
}

/// Exchange gateway errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
}

/// Why a trade was declined without being attempted.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclineReason {
    /// Sizing produced zero (balance, position count or minimum amount)
    ZeroSize,
    /// Exchange reports no holdings for the symbol
    NothingHeld,
    /// Signal carried no actionable price
    InvalidSignal(String),
    /// Exchange order id was already applied to the book
    DuplicateFill(String),
}

impl std::fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclineReason::ZeroSize => write!(f, "position size below minimum"),
            DeclineReason::NothingHeld => write!(f, "nothing held on exchange"),
            DeclineReason::InvalidSignal(why) => write!(f, "invalid signal: {}", why),
            DeclineReason::DuplicateFill(id) => write!(f, "order {} already applied", id),
        }
    }
}

/// Errors from executing a single trade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("No trade: {0}")]
    NoTrade(DeclineReason),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl ExecutionError {
    /// A declined trade is skipped silently rather than reported.
    pub fn is_declined(&self) -> bool {
        matches!(self, ExecutionError::NoTrade(_))
    }

    /// Transient errors are retried at the next scheduled pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Exchange(_))
    }
}

/// Control loop lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Control loop is already running")]
    AlreadyRunning,

    #[error("Control loop is not running")]
    NotRunning,

    #[error("Fund safety check failed: {0}")]
    FundSafety(String),

    #[error("Exchange unavailable: {0}")]
    Exchange(#[from] ExchangeError),
}

/// Advisory service errors. Advisory failures never block trading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisoryError {
    #[error("Advisory service unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;
