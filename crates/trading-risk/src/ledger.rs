//! Position ledger: the single source of truth for open positions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use trading_core::error::LedgerError;
use trading_core::types::{Position, QUANTITY_EPSILON};

use crate::StopLossManager;

/// Realized returns beyond this magnitude are treated as corrupted state.
const PLAUSIBLE_RETURN_LIMIT: Decimal = dec!(10);

/// Accounting result of a (partial) exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseOutcome {
    /// Cost basis allocated to the quantity sold
    pub proportional_invested: Decimal,
    /// Net proceeds minus allocated basis
    pub profit_amount: Decimal,
    /// Profit over allocated basis
    pub profit_rate: Decimal,
    /// Whether the position was removed
    pub fully_closed: bool,
    /// Whether the profit rate was replaced by the price-based fallback
    pub rate_clamped: bool,
}

/// Owns the map of open positions and all cost-basis math.
///
/// At most one position per symbol. A position is removed on full exit and is
/// never left with zero or negative quantity.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    positions: HashMap<String, Position>,
    stops: StopLossManager,
}

impl PositionLedger {
    /// Create an empty ledger. Stop-loss prices are derived with `stop_loss_rate`.
    pub fn new(stop_loss_rate: Decimal) -> Self {
        Self {
            positions: HashMap::new(),
            stops: StopLossManager::new(stop_loss_rate),
        }
    }

    /// Apply a buy fill, creating or averaging into the symbol's position.
    pub fn open(
        &mut self,
        symbol: &str,
        fill_qty: Decimal,
        fill_invested: Decimal,
        fill_price: Decimal,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError> {
        if fill_qty <= Decimal::ZERO || fill_invested <= Decimal::ZERO || fill_price <= Decimal::ZERO
        {
            return Err(LedgerError::InvalidFill {
                symbol: symbol.to_string(),
                quantity: fill_qty,
                invested: fill_invested,
            });
        }

        let position = match self.positions.get_mut(symbol) {
            Some(existing) => {
                existing.add_fill(fill_qty, fill_invested, order_id, now);
                existing.stop_loss_price = self.stops.stop_price(existing.average_price);
                debug!(
                    symbol,
                    average_price = %existing.average_price,
                    quantity = %existing.quantity,
                    "Averaged into position"
                );
                existing.clone()
            }
            None => {
                let position = Position::open(
                    symbol,
                    fill_qty,
                    fill_invested,
                    fill_price,
                    order_id,
                    now,
                    self.stops.stop_price(fill_price),
                );
                self.positions.insert(symbol.to_string(), position.clone());
                debug!(symbol, price = %fill_price, quantity = %fill_qty, "Opened position");
                position
            }
        };

        Ok(position)
    }

    /// Apply a sell fill, realizing profit on a pro-rata share of the cost basis.
    pub fn close(
        &mut self,
        symbol: &str,
        sell_qty: Decimal,
        sell_price: Decimal,
        gross_fee: Decimal,
    ) -> Result<CloseOutcome, LedgerError> {
        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;

        if sell_qty <= Decimal::ZERO {
            return Err(LedgerError::InvalidFill {
                symbol: symbol.to_string(),
                quantity: sell_qty,
                invested: Decimal::ZERO,
            });
        }
        if sell_qty > position.quantity + QUANTITY_EPSILON {
            return Err(LedgerError::OverSell {
                symbol: symbol.to_string(),
                requested: sell_qty,
                held: position.quantity,
            });
        }

        let fully_closed = position.is_whole(sell_qty);
        let proportional_invested = if fully_closed {
            position.total_invested
        } else {
            position.total_invested * (sell_qty / position.quantity)
        };

        let net = sell_qty * sell_price - gross_fee;
        let profit_amount = net - proportional_invested;
        let mut profit_rate = if proportional_invested.is_zero() {
            Decimal::ZERO
        } else {
            profit_amount / proportional_invested
        };

        let rate_clamped = profit_rate.abs() > PLAUSIBLE_RETURN_LIMIT;
        if rate_clamped {
            let fallback = (sell_price - position.average_price) / position.average_price;
            warn!(
                symbol,
                reported_rate = %profit_rate,
                fallback_rate = %fallback,
                invested = %proportional_invested,
                "Implausible realized return, using price-based rate"
            );
            profit_rate = fallback;
        }

        if fully_closed {
            self.positions.remove(symbol);
        } else {
            position.reduce(sell_qty, proportional_invested);
        }

        Ok(CloseOutcome {
            proportional_invested,
            profit_amount,
            profit_rate,
            fully_closed,
            rate_clamped,
        })
    }

    /// Drop a position without accounting. Used when the exchange no longer
    /// holds anything behind it.
    pub fn remove(&mut self, symbol: &str) -> Option<Position> {
        self.positions.remove(symbol)
    }

    /// Get a copy of the position for a symbol.
    pub fn get(&self, symbol: &str) -> Option<Position> {
        self.positions.get(symbol).cloned()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Number of open positions.
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    /// Copies of all open positions, ordered by symbol.
    pub fn snapshot(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }

    /// Symbols with open positions, ordered.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.positions.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Total fee-exclusive capital committed to open positions.
    pub fn total_invested(&self) -> Decimal {
        self.positions.values().map(|p| p.total_invested).sum()
    }
}
