//! Core types and traits for the trading system.
//!
//! This crate provides the foundational building blocks including:
//! - Position, trade record and daily risk state types
//! - Trading signals and exchange fill types
//! - The error taxonomy shared by every crate
//! - Collaborator traits for the exchange, signal source, advisory service and notifications

pub mod types;
pub mod traits;
pub mod error;

pub use error::{TradingError, TradingResult};
pub use types::*;
pub use traits::*;
