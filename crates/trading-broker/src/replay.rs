//! Replayed signal feed for paper runs.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use trading_core::traits::SignalSource;
use trading_core::types::{Signal, SignalAction};
use trading_core::{TradingError, TradingResult};

use crate::PaperExchange;

/// One recorded market observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: Decimal,
    #[serde(default = "hold")]
    pub action: SignalAction,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn hold() -> SignalAction {
    SignalAction::Hold
}

/// Replays ticks one per symbol per `analyze` call.
///
/// When attached to a [`PaperExchange`], every replayed tick also moves that
/// market's price, so fills happen at the replayed price.
pub struct ReplayFeed {
    queues: Mutex<HashMap<String, VecDeque<Tick>>>,
    symbols: Vec<String>,
    exchange: Option<Arc<PaperExchange>>,
}

impl ReplayFeed {
    /// Build a feed from ticks in replay order.
    pub fn new(ticks: Vec<Tick>) -> Self {
        let mut queues: HashMap<String, VecDeque<Tick>> = HashMap::new();
        let mut symbols = Vec::new();
        for tick in ticks {
            if !queues.contains_key(&tick.symbol) {
                symbols.push(tick.symbol.clone());
            }
            queues.entry(tick.symbol.clone()).or_default().push_back(tick);
        }
        Self {
            queues: Mutex::new(queues),
            symbols,
            exchange: None,
        }
    }

    /// Load a JSON array of ticks.
    pub fn from_path(path: impl AsRef<Path>) -> TradingResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ticks: Vec<Tick> = serde_json::from_str(&content).map_err(|e| {
            TradingError::Validation(format!("invalid replay file {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), ticks = ticks.len(), "Loaded replay feed");
        Ok(Self::new(ticks))
    }

    /// Drive the prices of a paper exchange from the replayed ticks.
    pub fn with_exchange(mut self, exchange: Arc<PaperExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Symbols in order of first appearance.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Ticks not yet replayed.
    pub async fn remaining(&self) -> usize {
        self.queues.lock().await.values().map(VecDeque::len).sum()
    }

    pub async fn is_exhausted(&self) -> bool {
        self.remaining().await == 0
    }
}

#[async_trait]
impl SignalSource for ReplayFeed {
    async fn analyze(&self, symbol: &str) -> Option<Signal> {
        let tick = self.queues.lock().await.get_mut(symbol)?.pop_front()?;

        if let Some(exchange) = &self.exchange {
            exchange.set_price(&tick.symbol, tick.price).await;
        }
        debug!(symbol, price = %tick.price, action = %tick.action, "Replayed tick");

        if tick.action == SignalAction::Hold {
            return None;
        }
        Some(
            Signal::new(tick.symbol, tick.action, tick.confidence, tick.price)
                .with_tags(tick.tags),
        )
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::traits::ExchangeGateway;

    const TICKS: &str = r#"[
        {"symbol": "KRW-BTC", "price": "50000", "action": "buy", "confidence": 0.8, "tags": ["rsi"]},
        {"symbol": "KRW-ETH", "price": "3000"},
        {"symbol": "KRW-BTC", "price": "55000", "action": "sell", "confidence": 1.0}
    ]"#;

    fn feed() -> ReplayFeed {
        ReplayFeed::new(serde_json::from_str(TICKS).unwrap())
    }

    #[tokio::test]
    async fn test_replays_in_order_per_symbol() {
        let feed = feed();
        assert_eq!(feed.symbols(), ["KRW-BTC".to_string(), "KRW-ETH".to_string()]);
        assert_eq!(feed.remaining().await, 3);

        let first = feed.analyze("KRW-BTC").await.unwrap();
        assert_eq!(first.action, SignalAction::Buy);
        assert_eq!(first.price, dec!(50000));
        assert_eq!(first.strategy_tags, vec!["rsi".to_string()]);

        let second = feed.analyze("KRW-BTC").await.unwrap();
        assert_eq!(second.action, SignalAction::Sell);

        assert!(feed.analyze("KRW-BTC").await.is_none());
        assert!(feed.analyze("KRW-XRP").await.is_none());
    }

    #[tokio::test]
    async fn test_hold_ticks_yield_no_signal() {
        let feed = feed();
        assert!(feed.analyze("KRW-ETH").await.is_none());
        assert_eq!(feed.remaining().await, 2);
    }

    #[tokio::test]
    async fn test_ticks_move_paper_prices() {
        let exchange = Arc::new(PaperExchange::new(dec!(1000000)));
        let feed = feed().with_exchange(exchange.clone());

        feed.analyze("KRW-ETH").await;
        assert_eq!(
            exchange.get_current_price("KRW-ETH").await.unwrap(),
            Some(dec!(3000))
        );

        feed.analyze("KRW-BTC").await;
        feed.analyze("KRW-BTC").await;
        assert_eq!(
            exchange.get_current_price("KRW-BTC").await.unwrap(),
            Some(dec!(55000))
        );
        assert!(feed.is_exhausted().await);
    }

    #[test]
    fn test_from_path() {
        let path = std::env::temp_dir().join(format!("replay-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, TICKS).unwrap();
        let feed = ReplayFeed::from_path(&path).unwrap();
        assert_eq!(feed.symbols().len(), 2);
        std::fs::remove_file(&path).unwrap();

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ReplayFeed::from_path(&path),
            Err(TradingError::Validation(_))
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
