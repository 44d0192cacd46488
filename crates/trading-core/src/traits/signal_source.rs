//! Signal source trait definition.

use crate::types::Signal;
use async_trait::async_trait;

/// Produces trading signals. How signals are derived is up to the implementor.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Analyze a market, returning a signal if there is anything to act on.
    async fn analyze(&self, symbol: &str) -> Option<Signal>;

    /// Get the source name.
    fn name(&self) -> &str;
}
