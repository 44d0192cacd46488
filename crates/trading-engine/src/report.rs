//! Periodic status report.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::warn;
use trading_core::traits::ExchangeGateway;

use crate::SharedBook;

const KST_OFFSET_SECS: i32 = 9 * 3600;
/// Daily returns beyond this magnitude flag the report header.
const NOTABLE_RETURN: Decimal = dec!(0.02);

/// One open position as shown in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLine {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    /// `None` when no current price was available
    pub unrealized_return: Option<Decimal>,
}

/// Point-in-time summary of the account and the day's trading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub total_value: Option<Decimal>,
    pub daily_return: Decimal,
    pub daily_profit: Decimal,
    pub trade_count: u32,
    pub win_rate: f64,
    pub positions: Vec<PositionLine>,
}

impl StatusReport {
    /// Gather a report from one book snapshot and current exchange prices.
    pub async fn build(book: &SharedBook, exchange: &dyn ExchangeGateway) -> Self {
        let snapshot = book.snapshot().await;

        let total_value = match exchange.portfolio_value().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Portfolio valuation failed for report");
                None
            }
        };

        let mut positions = Vec::with_capacity(snapshot.positions.len());
        for position in &snapshot.positions {
            let price = exchange
                .get_current_price(&position.symbol)
                .await
                .ok()
                .flatten();
            positions.push(PositionLine {
                symbol: position.symbol.clone(),
                quantity: position.quantity,
                average_price: position.average_price,
                unrealized_return: price.map(|p| position.unrealized_return(p)),
            });
        }

        Self {
            generated_at: snapshot.taken_at,
            total_value,
            daily_return: snapshot.risk.actual_return(),
            daily_profit: snapshot.risk.daily_profit_amount,
            trade_count: snapshot.risk.daily_trade_count,
            win_rate: snapshot.tally.win_rate(),
            positions,
        }
    }

    /// Plain-text rendering for notification sinks.
    pub fn render(&self) -> String {
        let marker = if self.daily_return > NOTABLE_RETURN {
            "[UP]"
        } else if self.daily_return < -NOTABLE_RETURN {
            "[DOWN]"
        } else {
            "[OK]"
        };

        let mut out = String::new();
        let _ = writeln!(out, "{} Trading status report", marker);
        let _ = writeln!(out);
        match self.total_value {
            Some(value) => {
                let _ = writeln!(out, "Total value: {} KRW", value.round_dp(0));
            }
            None => {
                let _ = writeln!(out, "Total value: unavailable");
            }
        }
        let _ = writeln!(
            out,
            "Daily return: {:+.2}% ({:+} KRW)",
            self.daily_return * Decimal::ONE_HUNDRED,
            self.daily_profit.round_dp(0)
        );
        let _ = writeln!(out, "Trades today: {}", self.trade_count);
        let _ = writeln!(out, "Win rate: {:.1}%", self.win_rate * 100.0);
        let _ = writeln!(out);
        let _ = writeln!(out, "Open positions ({})", self.positions.len());
        if self.positions.is_empty() {
            let _ = writeln!(out, "  none");
        }
        for line in &self.positions {
            match line.unrealized_return {
                Some(ret) => {
                    let _ = writeln!(
                        out,
                        "  {}: {:+.1}%",
                        line.symbol,
                        ret * Decimal::ONE_HUNDRED
                    );
                }
                None => {
                    let _ = writeln!(out, "  {}: no price", line.symbol);
                }
            }
        }
        let _ = writeln!(out);
        let _ = write!(out, "Time: {}", format_kst(self.generated_at));
        out
    }
}

fn format_kst(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(KST_OFFSET_SECS) {
        Some(kst) => at.with_timezone(&kst).format("%Y-%m-%d %H:%M:%S KST").to_string(),
        None => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}
