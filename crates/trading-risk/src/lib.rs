//! Position and risk accounting.
//!
//! Provides the position ledger, position sizing, stop-loss evaluation, and
//! the daily limits that halt trading.

mod daily_limits;
mod ledger;
mod position_sizer;
mod risk_gate;
mod stop_loss;

pub use daily_limits::{DailyLimits, HaltReason};
pub use ledger::{CloseOutcome, PositionLedger};
pub use position_sizer::PositionSizer;
pub use risk_gate::{RiskConfig, RiskGate};
pub use stop_loss::StopLossManager;
