//! Order execution: exchange I/O first, then one atomic book update.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trading_core::error::{DeclineReason, ExecutionError, LedgerError};
use trading_core::traits::ExchangeGateway;
use trading_core::types::{currency_of, Signal, TradeRecord, QUANTITY_EPSILON, QUOTE_CURRENCY};

use crate::book::{FillContext, SharedBook};

/// Outcome of liquidating every open position.
#[derive(Debug, Default)]
pub struct LiquidationReport {
    pub trades: Vec<TradeRecord>,
    /// Symbols that could not be sold, with the error that stopped them
    pub failures: Vec<(String, ExecutionError)>,
}

impl LiquidationReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// How a sell treats what is left of the position once it is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Keep any remainder the exchange fill did not cover.
    Partial,
    /// Clear the remainder, unless a newer buy was merged into it.
    Liquidation,
}

/// The only component that applies fills to the book.
///
/// Book state changes only after the exchange confirms a fill, and exactly
/// once per exchange order id.
pub struct OrderExecutor {
    exchange: Arc<dyn ExchangeGateway>,
    book: SharedBook,
}

impl OrderExecutor {
    pub fn new(exchange: Arc<dyn ExchangeGateway>, book: SharedBook) -> Self {
        Self { exchange, book }
    }

    pub fn book(&self) -> &SharedBook {
        &self.book
    }

    /// Size, place and book a market buy for `signal`.
    pub async fn execute_buy(&self, signal: &Signal) -> Result<TradeRecord, ExecutionError> {
        let symbol = signal.symbol.as_str();
        if signal.price <= Decimal::ZERO {
            return Err(ExecutionError::NoTrade(DeclineReason::InvalidSignal(
                format!("non-positive price {}", signal.price),
            )));
        }

        let balance = self.exchange.get_balance(QUOTE_CURRENCY).await?;
        let (size, fee) = {
            let book = self.book.read().await;
            let size = book.risk().size_position(
                balance,
                signal.clamped_confidence(),
                book.ledger().count(),
            );
            (size, book.risk().fee_for(size))
        };
        if size.is_zero() {
            debug!(symbol, balance = %balance, "Buy declined by sizing");
            return Err(ExecutionError::NoTrade(DeclineReason::ZeroSize));
        }

        let expected_qty = (size - fee) / signal.price;
        info!(
            symbol,
            amount = %size,
            fee = %fee,
            expected_qty = %expected_qty,
            confidence = signal.clamped_confidence(),
            "Placing market buy"
        );

        let value_before = self.portfolio_value().await;
        let order = self.exchange.buy_market(symbol, size).await?;
        let value_after = self.portfolio_value().await;

        let context = self.fill_context(signal.strategy_tags.clone(), value_before, value_after);
        let trade = self
            .book
            .write()
            .await
            .commit_buy(symbol, &order, size, fee, context, Utc::now())
            .map_err(|e| {
                log_commit_failure(symbol, &order.id, &e);
                e
            })?;

        log_trade(&trade);
        Ok(trade)
    }

    /// Sell the position named by `signal`.
    pub async fn execute_sell(&self, signal: &Signal) -> Result<TradeRecord, ExecutionError> {
        self.sell_position(&signal.symbol, signal.strategy_tags.clone(), Exit::Partial)
            .await
    }

    /// Force-sell one position, tagging the trade with `reason`.
    pub async fn liquidate(&self, symbol: &str, reason: &str) -> Result<TradeRecord, ExecutionError> {
        self.sell_position(symbol, vec![reason.to_string()], Exit::Partial)
            .await
    }

    /// Liquidate every open position.
    ///
    /// A failure on one symbol never stops the rest. Symbols that sold are
    /// cleared from the book even if exchange drift left a remainder, but a
    /// buy that lands mid-liquidation is kept.
    pub async fn emergency_sell_all(&self) -> LiquidationReport {
        let symbols = self.book.read().await.ledger().symbols();
        warn!(positions = symbols.len(), "Emergency liquidation of all positions");

        let mut report = LiquidationReport::default();
        for symbol in symbols {
            let tags = vec!["emergency".to_string()];
            match self.sell_position(&symbol, tags, Exit::Liquidation).await {
                Ok(trade) => report.trades.push(trade),
                Err(ExecutionError::NoTrade(DeclineReason::NothingHeld)) => {}
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "Emergency sell failed");
                    report.failures.push((symbol, e));
                }
            }
        }

        info!(
            sold = report.trades.len(),
            failed = report.failure_count(),
            "Emergency liquidation finished"
        );
        report
    }

    async fn sell_position(
        &self,
        symbol: &str,
        strategy_tags: Vec<String>,
        exit: Exit,
    ) -> Result<TradeRecord, ExecutionError> {
        let position = self
            .book
            .read()
            .await
            .ledger()
            .get(symbol)
            .ok_or_else(|| LedgerError::NoPosition(symbol.to_string()))?;

        let held = self.exchange.get_balance(currency_of(symbol)).await?;
        let quantity = held.min(position.quantity);
        if quantity <= Decimal::ZERO {
            if exit == Exit::Liquidation {
                let dropped = self
                    .book
                    .write()
                    .await
                    .drop_if_unchanged(symbol, &position.buy_order_ids);
                if dropped.is_some() {
                    warn!(symbol, "Exchange holds nothing, dropped stale position");
                }
            }
            return Err(ExecutionError::NoTrade(DeclineReason::NothingHeld));
        }
        if held + QUANTITY_EPSILON < position.quantity {
            warn!(
                symbol,
                ledger_qty = %position.quantity,
                exchange_qty = %held,
                "Exchange holds less than the ledger, selling what is held"
            );
        }

        info!(symbol, quantity = %quantity, "Placing market sell");
        let value_before = self.portfolio_value().await;
        let order = self.exchange.sell_market(symbol, quantity).await?;
        let value_after = self.portfolio_value().await;

        let context = self.fill_context(strategy_tags, value_before, value_after);
        let committed = {
            let mut book = self.book.write().await;
            match exit {
                Exit::Partial => book
                    .commit_sell(symbol, &order, context, Utc::now())
                    .map(|trade| (trade, None)),
                Exit::Liquidation => book.commit_liquidation(
                    symbol,
                    &order,
                    &position.buy_order_ids,
                    context,
                    Utc::now(),
                ),
            }
        };
        let (trade, residue) = committed.map_err(|e| {
            log_commit_failure(symbol, &order.id, &e);
            e
        })?;

        log_trade(&trade);
        if let Some(rest) = residue {
            warn!(
                symbol,
                quantity = %rest.quantity,
                invested = %rest.total_invested,
                "Cleared residual position after liquidation"
            );
        }
        Ok(trade)
    }

    fn fill_context(
        &self,
        strategy_tags: Vec<String>,
        portfolio_value_before: Decimal,
        portfolio_value_after: Decimal,
    ) -> FillContext {
        FillContext {
            strategy_tags,
            portfolio_value_before,
            portfolio_value_after,
            is_paper: self.exchange.is_paper(),
        }
    }

    async fn portfolio_value(&self) -> Decimal {
        match self.exchange.portfolio_value().await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Portfolio valuation failed");
                Decimal::ZERO
            }
        }
    }
}

fn log_commit_failure(symbol: &str, order_id: &str, error: &ExecutionError) {
    if error.is_declined() {
        warn!(symbol, order_id, error = %error, "Fill not applied");
    } else {
        error!(symbol, order_id, error = %error, "Exchange fill could not be booked");
    }
}

fn log_trade(trade: &TradeRecord) {
    info!(
        id = %trade.id,
        timestamp = %trade.timestamp,
        symbol = %trade.symbol,
        side = %trade.side,
        quantity = %trade.quantity,
        price = %trade.price,
        gross_amount = %trade.gross_amount,
        fee = %trade.fee,
        invested_amount = %trade.invested_amount,
        profit_amount = %trade.profit_amount,
        profit_rate = %trade.profit_rate,
        portfolio_value_before = %trade.portfolio_value_before,
        portfolio_value_after = %trade.portfolio_value_after,
        strategy_tags = ?trade.strategy_tags,
        is_paper_trade = trade.is_paper_trade,
        "Trade executed"
    );
}
