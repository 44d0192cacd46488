//! Paper exchange with a virtual KRW wallet.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use trading_core::error::ExchangeError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{currency_of, BalanceEntry, OrderResult, QUOTE_CURRENCY};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Wallet {
    balances: HashMap<String, Decimal>,
    prices: HashMap<String, Decimal>,
    pending_failure: Option<ExchangeError>,
}

impl Wallet {
    fn balance(&self, currency: &str) -> Decimal {
        self.balances.get(currency).copied().unwrap_or(Decimal::ZERO)
    }

    fn credit(&mut self, currency: &str, amount: Decimal) {
        *self.balances.entry(currency.to_string()).or_insert(Decimal::ZERO) += amount;
    }

    fn debit(&mut self, currency: &str, amount: Decimal) {
        let remaining = self.balance(currency) - amount;
        if remaining <= Decimal::ZERO && currency != QUOTE_CURRENCY {
            self.balances.remove(currency);
        } else {
            self.balances.insert(currency.to_string(), remaining);
        }
    }

    fn price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        self.prices
            .get(symbol)
            .copied()
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| ExchangeError::Network(format!("no market price for {}", symbol)))
    }
}

/// Simulated exchange filling market orders at the last set price.
///
/// Buys deduct the full KRW amount and credit `(krw - fee) / price` coins;
/// sells credit `qty * price - fee` KRW.
pub struct PaperExchange {
    wallet: Mutex<Wallet>,
    fee_rate: Decimal,
}

impl PaperExchange {
    /// Create a paper exchange holding `initial_krw`.
    pub fn new(initial_krw: Decimal) -> Self {
        let mut wallet = Wallet::default();
        wallet.balances.insert(QUOTE_CURRENCY.to_string(), initial_krw);
        Self {
            wallet: Mutex::new(wallet),
            fee_rate: dec!(0.0005),
        }
    }

    /// Set the simulated fee rate.
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Seed a market price.
    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.wallet.get_mut().prices.insert(symbol.into(), price);
        self
    }

    /// Move a market price.
    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.wallet.lock().await.prices.insert(symbol.to_string(), price);
    }

    /// Overwrite a currency balance, e.g. to simulate an external transfer.
    pub async fn set_balance(&self, currency: &str, amount: Decimal) {
        let mut wallet = self.wallet.lock().await;
        if amount.is_zero() && currency != QUOTE_CURRENCY {
            wallet.balances.remove(currency);
        } else {
            wallet.balances.insert(currency.to_string(), amount);
        }
    }

    /// Fail the next market order with `error` instead of filling it.
    pub async fn fail_next_order(&self, error: ExchangeError) {
        self.wallet.lock().await.pending_failure = Some(error);
    }
}

#[async_trait]
impl ExchangeGateway for PaperExchange {
    async fn get_balance(&self, currency: &str) -> Result<Decimal, ExchangeError> {
        Ok(self.wallet.lock().await.balance(currency))
    }

    async fn get_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        let wallet = self.wallet.lock().await;
        let mut entries: Vec<BalanceEntry> = wallet
            .balances
            .iter()
            .filter(|(currency, amount)| **amount > Decimal::ZERO || *currency == QUOTE_CURRENCY)
            .map(|(currency, amount)| BalanceEntry::new(currency.clone(), *amount))
            .collect();
        entries.sort_by(|a, b| {
            b.is_quote()
                .cmp(&a.is_quote())
                .then_with(|| a.currency.cmp(&b.currency))
        });
        Ok(entries)
    }

    async fn get_current_price(&self, symbol: &str) -> Result<Option<Decimal>, ExchangeError> {
        Ok(self.wallet.lock().await.prices.get(symbol).copied())
    }

    async fn buy_market(
        &self,
        symbol: &str,
        krw_amount: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let mut wallet = self.wallet.lock().await;
        if let Some(error) = wallet.pending_failure.take() {
            return Err(error);
        }

        let price = wallet.price(symbol)?;
        let available = wallet.balance(QUOTE_CURRENCY);
        if krw_amount <= Decimal::ZERO || krw_amount > available {
            return Err(ExchangeError::InsufficientFunds {
                required: krw_amount,
                available,
            });
        }

        let fee = krw_amount * self.fee_rate;
        let quantity = (krw_amount - fee) / price;
        wallet.debit(QUOTE_CURRENCY, krw_amount);
        wallet.credit(currency_of(symbol), quantity);

        let order = OrderResult::new(Uuid::new_v4().to_string(), quantity, price);
        info!(
            symbol,
            order_id = %order.id,
            krw = %krw_amount,
            quantity = %quantity,
            price = %price,
            "[PAPER] Market buy filled"
        );
        Ok(order)
    }

    async fn sell_market(
        &self,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let mut wallet = self.wallet.lock().await;
        if let Some(error) = wallet.pending_failure.take() {
            return Err(error);
        }

        let price = wallet.price(symbol)?;
        let currency = currency_of(symbol);
        let held = wallet.balance(currency);
        if quantity <= Decimal::ZERO || quantity > held {
            return Err(ExchangeError::InsufficientFunds {
                required: quantity,
                available: held,
            });
        }

        let gross = quantity * price;
        let fee = gross * self.fee_rate;
        wallet.debit(currency, quantity);
        wallet.credit(QUOTE_CURRENCY, gross - fee);

        let order = OrderResult::new(Uuid::new_v4().to_string(), quantity, price);
        info!(
            symbol,
            order_id = %order.id,
            quantity = %quantity,
            price = %price,
            proceeds = %(gross - fee),
            "[PAPER] Market sell filled"
        );
        debug!(krw = %wallet.balance(QUOTE_CURRENCY), "Paper wallet updated");
        Ok(order)
    }

    fn is_paper(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> PaperExchange {
        PaperExchange::new(dec!(1000000)).with_price("KRW-BTC", dec!(50000))
    }

    #[tokio::test]
    async fn test_buy_deducts_krw_and_credits_coins() {
        let exchange = exchange();
        let order = exchange.buy_market("KRW-BTC", dec!(5000)).await.unwrap();

        // 5,000 - 2.5 fee = 4,997.5 KRW of coin
        assert_eq!(order.filled_qty, dec!(0.09995));
        assert_eq!(order.avg_price, dec!(50000));
        assert_eq!(exchange.get_balance("KRW").await.unwrap(), dec!(995000));
        assert_eq!(exchange.get_balance("BTC").await.unwrap(), dec!(0.09995));
    }

    #[tokio::test]
    async fn test_sell_credits_net_proceeds() {
        let exchange = exchange();
        exchange.set_balance("BTC", dec!(0.1)).await;
        exchange.set_price("KRW-BTC", dec!(55000)).await;

        let order = exchange.sell_market("KRW-BTC", dec!(0.1)).await.unwrap();
        assert_eq!(order.filled_qty, dec!(0.1));
        // 5,500 gross - 2.75 fee
        assert_eq!(exchange.get_balance("KRW").await.unwrap(), dec!(1005497.25));
        assert_eq!(exchange.get_balance("BTC").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let exchange = exchange();
        let err = exchange.buy_market("KRW-BTC", dec!(2000000)).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));

        let err = exchange.sell_market("KRW-BTC", dec!(1)).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));
        assert_eq!(exchange.get_balance("KRW").await.unwrap(), dec!(1000000));
    }

    #[tokio::test]
    async fn test_unknown_market_fails() {
        let exchange = exchange();
        assert!(exchange.buy_market("KRW-XRP", dec!(5000)).await.is_err());
        assert_eq!(exchange.get_current_price("KRW-XRP").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let exchange = exchange();
        exchange
            .fail_next_order(ExchangeError::RateLimited { retry_after_secs: 1 })
            .await;

        let err = exchange.buy_market("KRW-BTC", dec!(5000)).await.unwrap_err();
        assert_eq!(err, ExchangeError::RateLimited { retry_after_secs: 1 });
        assert_eq!(exchange.get_balance("KRW").await.unwrap(), dec!(1000000));
        assert!(exchange.buy_market("KRW-BTC", dec!(5000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_portfolio_value() {
        let exchange = exchange().with_fee_rate(Decimal::ZERO);
        exchange.buy_market("KRW-BTC", dec!(100000)).await.unwrap();
        exchange.set_price("KRW-BTC", dec!(60000)).await;

        // 900,000 KRW + 2 BTC * 60,000
        assert_eq!(exchange.portfolio_value().await.unwrap(), dec!(1020000));

        let balances = exchange.get_balances().await.unwrap();
        assert_eq!(balances[0].currency, "KRW");
        assert_eq!(balances[1].currency, "BTC");
    }
}
