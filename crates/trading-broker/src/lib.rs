//! Exchange and signal-source implementations for paper trading.

mod paper;
mod replay;

pub use paper::PaperExchange;
pub use replay::{ReplayFeed, Tick};
