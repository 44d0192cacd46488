//! Notification sink trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Category of a notification, used by sinks for routing and throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Trade,
    Advisory,
    Report,
    Emergency,
    Info,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Trade => write!(f, "trade"),
            NotificationKind::Advisory => write!(f, "advisory"),
            NotificationKind::Report => write!(f, "report"),
            NotificationKind::Emergency => write!(f, "emergency"),
            NotificationKind::Info => write!(f, "info"),
        }
    }
}

/// Fire-and-forget notification delivery.
///
/// Delivery failures, rate limiting and cooldowns are the sink's concern; the
/// engine never waits on a result.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &str, kind: NotificationKind);
}
