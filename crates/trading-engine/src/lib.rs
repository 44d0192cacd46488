//! Trading engine.
//!
//! Wires the position ledger and risk gate behind one lock, executes trades
//! against an exchange gateway, and drives everything from a periodic
//! control loop.

mod advisory;
mod book;
mod control;
mod executor;
mod report;
#[cfg(test)]
mod testing;

pub use advisory::{advisory_alerts, build_snapshot, ALERT_CONFIDENCE, ALERT_RISK_SCORE};
pub use book::{Book, BookSnapshot, DailyTally, SharedBook};
pub use control::{trading_day, ControlConfig, ControlLoop, ControlStatus, RunState};
pub use executor::{LiquidationReport, OrderExecutor};
pub use report::{PositionLine, StatusReport};
