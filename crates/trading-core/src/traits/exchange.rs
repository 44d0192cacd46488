//! Exchange gateway trait definition.

use crate::error::ExchangeError;
use crate::types::{market_of, BalanceEntry, OrderResult, QUOTE_CURRENCY};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Trait for exchange integrations.
///
/// Gateways execute market orders and report balances and prices. They hold no
/// bookkeeping of their own beyond what the exchange reports.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Get the free balance of one currency (`KRW`, `BTC`, ...).
    async fn get_balance(&self, currency: &str) -> Result<Decimal, ExchangeError>;

    /// Get every non-empty balance on the account.
    async fn get_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError>;

    /// Get the last traded price of a market, `None` if the market is unknown.
    async fn get_current_price(&self, symbol: &str) -> Result<Option<Decimal>, ExchangeError>;

    /// Buy at market, spending `krw_amount` KRW including fees.
    async fn buy_market(
        &self,
        symbol: &str,
        krw_amount: Decimal,
    ) -> Result<OrderResult, ExchangeError>;

    /// Sell `quantity` coins at market.
    async fn sell_market(&self, symbol: &str, quantity: Decimal)
        -> Result<OrderResult, ExchangeError>;

    /// Whether fills are simulated.
    fn is_paper(&self) -> bool {
        false
    }

    /// Total account value in KRW: cash plus coins marked at current prices.
    ///
    /// Coins whose market has no price are left out of the total.
    async fn portfolio_value(&self) -> Result<Decimal, ExchangeError> {
        let mut total = Decimal::ZERO;
        for balance in self.get_balances().await? {
            if balance.currency == QUOTE_CURRENCY {
                total += balance.amount;
            } else if balance.amount > Decimal::ZERO {
                if let Some(price) = self.get_current_price(&market_of(&balance.currency)).await? {
                    total += balance.amount * price;
                }
            }
        }
        Ok(total)
    }

    /// Get the gateway name.
    fn name(&self) -> &str;
}
