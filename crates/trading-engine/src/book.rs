//! The shared book: positions, daily risk and applied fills behind one lock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use trading_core::error::{DeclineReason, ExecutionError, LedgerError};
use trading_core::types::{OrderResult, Position, RiskState, Side, TradeRecord};
use trading_risk::{PositionLedger, RiskConfig, RiskGate};

/// Sell outcomes counted since the last daily reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTally {
    pub sells: u32,
    pub wins: u32,
}

impl DailyTally {
    /// Fraction of today's sells that realized a profit.
    pub fn win_rate(&self) -> f64 {
        if self.sells == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.sells)
        }
    }
}

/// Consistent copy of the book, taken under a single read lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub taken_at: DateTime<Utc>,
    pub positions: Vec<Position>,
    pub risk: RiskState,
    pub tally: DailyTally,
}

impl BookSnapshot {
    pub fn total_invested(&self) -> Decimal {
        self.positions.iter().map(|p| p.total_invested).sum()
    }
}

/// Per-fill data that does not come from the exchange fill itself.
#[derive(Debug, Clone, Default)]
pub(crate) struct FillContext {
    pub strategy_tags: Vec<String>,
    pub portfolio_value_before: Decimal,
    pub portfolio_value_after: Decimal,
    pub is_paper: bool,
}

/// Position ledger and risk gate, mutated together.
///
/// Mutators are crate-private: only the order executor applies fills, and it
/// does so while holding the write lock for the whole ledger and risk update.
#[derive(Debug)]
pub struct Book {
    ledger: PositionLedger,
    risk: RiskGate,
    applied_orders: HashSet<String>,
    tally: DailyTally,
}

impl Book {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            ledger: PositionLedger::new(config.stop_loss_rate),
            risk: RiskGate::new(config),
            applied_orders: HashSet::new(),
            tally: DailyTally::default(),
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn risk(&self) -> &RiskGate {
        &self.risk
    }

    pub fn tally(&self) -> DailyTally {
        self.tally
    }

    /// Whether a fill with this exchange order id was already applied.
    pub fn is_applied(&self, order_id: &str) -> bool {
        self.applied_orders.contains(order_id)
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            taken_at: Utc::now(),
            positions: self.ledger.snapshot(),
            risk: self.risk.state().clone(),
            tally: self.tally,
        }
    }

    fn guard_duplicate(&self, order: &OrderResult) -> Result<(), ExecutionError> {
        if self.is_applied(&order.id) {
            return Err(ExecutionError::NoTrade(DeclineReason::DuplicateFill(
                order.id.clone(),
            )));
        }
        Ok(())
    }

    /// Apply a confirmed buy fill.
    pub(crate) fn commit_buy(
        &mut self,
        symbol: &str,
        order: &OrderResult,
        gross_amount: Decimal,
        fee: Decimal,
        context: FillContext,
        now: DateTime<Utc>,
    ) -> Result<TradeRecord, ExecutionError> {
        self.guard_duplicate(order)?;

        let invested = order.filled_qty * order.avg_price;
        self.ledger
            .open(symbol, order.filled_qty, invested, order.avg_price, &order.id, now)?;

        let trade = TradeRecord {
            id: order.id.clone(),
            timestamp: now,
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity: order.filled_qty,
            price: order.avg_price,
            gross_amount,
            fee,
            invested_amount: invested,
            profit_amount: Decimal::ZERO,
            profit_rate: Decimal::ZERO,
            portfolio_value_before: context.portfolio_value_before,
            portfolio_value_after: context.portfolio_value_after,
            strategy_tags: context.strategy_tags,
            is_paper_trade: context.is_paper,
        };
        self.risk.record_fill(&trade);
        self.applied_orders.insert(order.id.clone());
        Ok(trade)
    }

    /// Apply a confirmed sell fill. The filled quantity is clamped to the
    /// position so exchange rounding never over-sells the ledger.
    pub(crate) fn commit_sell(
        &mut self,
        symbol: &str,
        order: &OrderResult,
        context: FillContext,
        now: DateTime<Utc>,
    ) -> Result<TradeRecord, ExecutionError> {
        self.guard_duplicate(order)?;

        let held = self
            .ledger
            .get(symbol)
            .map(|p| p.quantity)
            .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;
        let quantity = order.filled_qty.min(held);
        let gross_amount = quantity * order.avg_price;
        let fee = self.risk.fee_for(gross_amount);

        let outcome = self.ledger.close(symbol, quantity, order.avg_price, fee)?;

        let trade = TradeRecord {
            id: order.id.clone(),
            timestamp: now,
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity,
            price: order.avg_price,
            gross_amount,
            fee,
            invested_amount: outcome.proportional_invested,
            profit_amount: outcome.profit_amount,
            profit_rate: outcome.profit_rate,
            portfolio_value_before: context.portfolio_value_before,
            portfolio_value_after: context.portfolio_value_after,
            strategy_tags: context.strategy_tags,
            is_paper_trade: context.is_paper,
        };
        self.risk.record_fill(&trade);
        self.applied_orders.insert(order.id.clone());
        self.tally.sells += 1;
        if trade.is_win() {
            self.tally.wins += 1;
        }
        Ok(trade)
    }

    /// Apply a liquidation fill and clear whatever the sell left behind.
    ///
    /// The remainder is only dropped while its buys still match
    /// `expected_buy_ids`, the ids the sell was sized from. A buy merged in
    /// while the sell was in flight keeps the position alive.
    pub(crate) fn commit_liquidation(
        &mut self,
        symbol: &str,
        order: &OrderResult,
        expected_buy_ids: &[String],
        context: FillContext,
        now: DateTime<Utc>,
    ) -> Result<(TradeRecord, Option<Position>), ExecutionError> {
        let trade = self.commit_sell(symbol, order, context, now)?;
        let residue = self.drop_if_unchanged(symbol, expected_buy_ids);
        Ok((trade, residue))
    }

    /// Drop a position without accounting, unless a buy not in
    /// `expected_buy_ids` has been merged into it.
    pub(crate) fn drop_if_unchanged(
        &mut self,
        symbol: &str,
        expected_buy_ids: &[String],
    ) -> Option<Position> {
        let unchanged = self
            .ledger
            .get(symbol)
            .map_or(false, |p| p.buy_order_ids.as_slice() == expected_buy_ids);
        if unchanged {
            self.ledger.remove(symbol)
        } else {
            None
        }
    }

    pub(crate) fn reset_daily(&mut self) {
        self.risk.reset_daily();
        self.tally = DailyTally::default();
    }
}

/// Cloneable handle to the book shared by every worker.
#[derive(Debug, Clone)]
pub struct SharedBook {
    inner: Arc<RwLock<Book>>,
}

impl SharedBook {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Book::new(config))),
        }
    }

    /// Read access. Everything observed under one guard is mutually consistent.
    pub async fn read(&self) -> RwLockReadGuard<'_, Book> {
        self.inner.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Book> {
        self.inner.write().await
    }

    pub async fn snapshot(&self) -> BookSnapshot {
        self.inner.read().await.snapshot()
    }

    /// Start a new trading day. Idempotent.
    pub async fn reset_daily(&self) {
        self.inner.write().await.reset_daily();
    }
}
