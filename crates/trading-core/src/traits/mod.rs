//! Collaborator traits consumed by the trading engine.

mod advisory;
mod exchange;
mod notification;
mod signal_source;

pub use advisory::{AdvisoryService, Recommendation};
pub use exchange::ExchangeGateway;
pub use notification::{NotificationKind, NotificationSink};
pub use signal_source::SignalSource;
