//! Test gateway that parks market orders until released.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Notify;
use trading_broker::PaperExchange;
use trading_core::error::ExchangeError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{BalanceEntry, OrderResult};

/// Wraps a [`PaperExchange`], holding gated orders at the door.
///
/// `entered` fires once a gated order is waiting, `release` lets one through.
/// An order that is never released stays in flight forever.
pub(crate) struct GatedExchange {
    inner: Arc<PaperExchange>,
    gate_buys: bool,
    gate_sells: bool,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedExchange {
    pub fn gating_buys(inner: Arc<PaperExchange>) -> Self {
        Self::new(inner, true, false)
    }

    pub fn gating_sells(inner: Arc<PaperExchange>) -> Self {
        Self::new(inner, false, true)
    }

    fn new(inner: Arc<PaperExchange>, gate_buys: bool, gate_sells: bool) -> Self {
        Self {
            inner,
            gate_buys,
            gate_sells,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    async fn pass(&self, gated: bool) {
        if gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl ExchangeGateway for GatedExchange {
    async fn get_balance(&self, currency: &str) -> Result<Decimal, ExchangeError> {
        self.inner.get_balance(currency).await
    }

    async fn get_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        self.inner.get_balances().await
    }

    async fn get_current_price(&self, symbol: &str) -> Result<Option<Decimal>, ExchangeError> {
        self.inner.get_current_price(symbol).await
    }

    async fn buy_market(
        &self,
        symbol: &str,
        krw_amount: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.pass(self.gate_buys).await;
        self.inner.buy_market(symbol, krw_amount).await
    }

    async fn sell_market(
        &self,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.pass(self.gate_sells).await;
        self.inner.sell_market(symbol, quantity).await
    }

    fn is_paper(&self) -> bool {
        self.inner.is_paper()
    }

    fn name(&self) -> &str {
        "gated"
    }
}
