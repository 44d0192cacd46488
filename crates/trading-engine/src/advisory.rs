//! Advisory snapshot building and alert selection.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use trading_core::traits::{ExchangeGateway, NotificationKind, Recommendation};
use trading_core::types::{MarketSnapshot, Position, SignalAction};

use crate::SharedBook;

/// Recommendations above this confidence are forwarded as alerts.
pub const ALERT_CONFIDENCE: f64 = 0.8;
/// Risk scores above this raise an emergency notice.
pub const ALERT_RISK_SCORE: f64 = 0.8;

/// Aggregate the book and current prices for an advisory evaluation.
///
/// Positions and risk counters come from one consistent book snapshot.
/// Markets whose price cannot be fetched are left out.
pub async fn build_snapshot(
    book: &SharedBook,
    exchange: &dyn ExchangeGateway,
    symbols: &[String],
) -> (MarketSnapshot, Vec<Position>) {
    let book = book.snapshot().await;

    let markets: BTreeSet<&str> = symbols
        .iter()
        .map(String::as_str)
        .chain(book.positions.iter().map(|p| p.symbol.as_str()))
        .collect();

    let mut prices = HashMap::new();
    for symbol in markets {
        match exchange.get_current_price(symbol).await {
            Ok(Some(price)) => {
                prices.insert(symbol.to_string(), price);
            }
            Ok(None) => {}
            Err(e) => debug!(symbol, error = %e, "Price unavailable for snapshot"),
        }
    }

    let unrealized_returns = book
        .positions
        .iter()
        .filter_map(|p| {
            prices
                .get(&p.symbol)
                .map(|price| (p.symbol.clone(), p.unrealized_return(*price)))
        })
        .collect();

    let snapshot = MarketSnapshot {
        timestamp: Some(Utc::now()),
        total_symbols: symbols.len(),
        active_positions: book.positions.len(),
        prices,
        unrealized_returns,
        risk: book.risk,
    };
    (snapshot, book.positions)
}

/// Alerts worth sending for a recommendation. Purely informational.
pub fn advisory_alerts(
    recommendation: &Recommendation,
    open_positions: usize,
    max_positions: usize,
) -> Vec<(NotificationKind, String)> {
    let mut alerts = Vec::new();

    if recommendation.confidence > ALERT_CONFIDENCE {
        match recommendation.action {
            SignalAction::Sell if open_positions > 0 => alerts.push((
                NotificationKind::Advisory,
                format!(
                    "Advisory: strong sell ({:.0}%), review open positions. {}",
                    recommendation.confidence * 100.0,
                    recommendation.reasoning
                ),
            )),
            SignalAction::Buy if open_positions < max_positions => alerts.push((
                NotificationKind::Advisory,
                format!(
                    "Advisory: buy opportunity ({:.0}%). {}",
                    recommendation.confidence * 100.0,
                    recommendation.reasoning
                ),
            )),
            _ => {}
        }
    }

    if recommendation.risk_score > ALERT_RISK_SCORE {
        alerts.push((
            NotificationKind::Emergency,
            format!(
                "Advisory: high risk detected ({:.0}%), consider reducing positions",
                recommendation.risk_score * 100.0
            ),
        ));
    }

    alerts
}
