//! Risk gate: sizing, daily limits and the daily aggregates they act on.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use trading_core::types::{Position, RiskState, Side, TradeRecord, TradingLimits};
use trading_core::TradingError;

use crate::{DailyLimits, HaltReason, PositionSizer, StopLossManager};

/// Risk configuration, immutable for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Halt once the daily return reaches this rate
    pub max_daily_profit_rate: Decimal,
    /// Halt once the daily return falls to minus this rate
    pub max_daily_loss_rate: Decimal,
    /// Maximum concurrently open positions
    pub max_positions: usize,
    /// Upper bound on one entry as a fraction of usable balance
    pub max_position_size_fraction: Decimal,
    /// Stop price distance below the average price
    pub stop_loss_rate: Decimal,
    /// Smallest KRW order worth placing
    pub min_trade_amount: Decimal,
    /// Exchange fee rate applied to both legs
    pub fee_rate: Decimal,
    /// Deduct fees from the buy amount before computing quantity
    pub include_fees: bool,
    /// Scale entries up with realized daily profit
    pub compound_interest: bool,
    /// Operational ceiling on fills per day
    pub max_daily_trades: u32,
    /// Optional cap on the KRW balance used for sizing
    pub capital_limit: Option<Decimal>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_profit_rate: dec!(0.05),
            max_daily_loss_rate: dec!(0.03),
            max_positions: 5,
            max_position_size_fraction: dec!(0.3),
            stop_loss_rate: dec!(0.02),
            min_trade_amount: dec!(50000),
            fee_rate: dec!(0.0005),
            include_fees: true,
            compound_interest: true,
            max_daily_trades: 100,
            capital_limit: None,
        }
    }
}

impl RiskConfig {
    /// Reject values the gate cannot operate with.
    pub fn validate(&self) -> Result<(), TradingError> {
        let rates = [
            ("max_daily_profit_rate", self.max_daily_profit_rate),
            ("max_daily_loss_rate", self.max_daily_loss_rate),
            ("max_position_size_fraction", self.max_position_size_fraction),
            ("stop_loss_rate", self.stop_loss_rate),
            ("fee_rate", self.fee_rate),
        ];
        for (name, value) in rates {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(TradingError::Config(format!(
                    "risk.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        // A zero daily limit halts the loop before its first trade.
        let positive = [
            ("max_daily_profit_rate", self.max_daily_profit_rate),
            ("max_daily_loss_rate", self.max_daily_loss_rate),
            ("max_position_size_fraction", self.max_position_size_fraction),
        ];
        for (name, value) in positive {
            if value.is_zero() {
                return Err(TradingError::Config(format!("risk.{} must be positive", name)));
            }
        }
        if self.max_positions == 0 {
            return Err(TradingError::Config(
                "risk.max_positions must be at least 1".to_string(),
            ));
        }
        if self.max_daily_trades == 0 {
            return Err(TradingError::Config(
                "risk.max_daily_trades must be at least 1".to_string(),
            ));
        }
        if self.min_trade_amount < Decimal::ZERO {
            return Err(TradingError::Config(format!(
                "risk.min_trade_amount must not be negative, got {}",
                self.min_trade_amount
            )));
        }
        if let Some(limit) = self.capital_limit {
            if limit <= Decimal::ZERO {
                return Err(TradingError::Config(format!(
                    "risk.capital_limit must be positive, got {}",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Summary handed to advisory services.
    pub fn limits(&self) -> TradingLimits {
        TradingLimits {
            max_positions: self.max_positions,
            max_daily_profit_rate: self.max_daily_profit_rate,
            max_daily_loss_rate: self.max_daily_loss_rate,
            stop_loss_rate: self.stop_loss_rate,
        }
    }

    pub fn daily_limits(&self) -> DailyLimits {
        DailyLimits {
            max_daily_profit_rate: self.max_daily_profit_rate,
            max_daily_loss_rate: self.max_daily_loss_rate,
            max_daily_trades: self.max_daily_trades,
        }
    }
}

/// Owns the daily [`RiskState`] and the per-trade policy evaluated against it.
#[derive(Debug, Clone)]
pub struct RiskGate {
    config: RiskConfig,
    sizer: PositionSizer,
    stop_loss: StopLossManager,
    daily_limits: DailyLimits,
    state: RiskState,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            sizer: PositionSizer::new(&config),
            stop_loss: StopLossManager::new(config.stop_loss_rate),
            daily_limits: config.daily_limits(),
            state: RiskState::default(),
            config,
        }
    }

    /// Evaluate the daily limits against the current aggregates.
    pub fn check_daily_limits(&self) -> Option<HaltReason> {
        self.daily_limits.check(&self.state)
    }

    /// KRW amount for a new entry, zero to decline.
    pub fn size_position(
        &self,
        available_balance: Decimal,
        confidence: f64,
        open_positions: usize,
    ) -> Decimal {
        let size = self.sizer.calculate(
            available_balance,
            confidence,
            open_positions,
            self.state.daily_profit_amount,
        );
        debug!(
            balance = %available_balance,
            confidence,
            open_positions,
            size = %size,
            "Sized position"
        );
        size
    }

    /// Fold one executed trade into the daily aggregates.
    pub fn record_fill(&mut self, trade: &TradeRecord) {
        match trade.side {
            Side::Buy => self.state.apply(trade.invested_amount, Decimal::ZERO),
            Side::Sell => self.state.apply(trade.invested_amount, trade.profit_amount),
        }
    }

    /// Zero the daily aggregates. Safe to call repeatedly.
    pub fn reset_daily(&mut self) {
        if self.state != RiskState::default() {
            info!(
                trades = self.state.daily_trade_count,
                profit = %self.state.daily_profit_amount,
                daily_return = %self.state.daily_return,
                "Resetting daily risk state"
            );
        }
        self.state.reset();
    }

    pub fn should_stop_loss(&self, position: &Position, current_price: Decimal) -> bool {
        self.stop_loss.is_triggered(position, current_price)
    }

    /// Fee charged on `amount` under the configured fee policy.
    pub fn fee_for(&self, amount: Decimal) -> Decimal {
        if self.config.include_fees {
            amount * self.config.fee_rate
        } else {
            Decimal::ZERO
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}
