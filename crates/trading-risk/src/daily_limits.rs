//! Daily profit, loss and trade-count limits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use trading_core::types::RiskState;

/// Why trading halts for the rest of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HaltReason {
    ProfitTarget { actual: Decimal, limit: Decimal },
    LossLimit { actual: Decimal, limit: Decimal },
    TradeCount { count: u32, limit: u32 },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::ProfitTarget { actual, limit } => write!(
                f,
                "daily profit target reached: {:.2}% (target {:.2}%)",
                actual * Decimal::ONE_HUNDRED,
                limit * Decimal::ONE_HUNDRED
            ),
            HaltReason::LossLimit { actual, limit } => write!(
                f,
                "daily loss limit reached: {:.2}% (limit -{:.2}%)",
                actual * Decimal::ONE_HUNDRED,
                limit * Decimal::ONE_HUNDRED
            ),
            HaltReason::TradeCount { count, limit } => {
                write!(f, "daily trade count reached: {} (limit {})", count, limit)
            }
        }
    }
}

/// Thresholds that stop trading for the day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyLimits {
    pub max_daily_profit_rate: Decimal,
    pub max_daily_loss_rate: Decimal,
    pub max_daily_trades: u32,
}

impl DailyLimits {
    /// Evaluate the limits. Pure: repeated calls on the same state agree.
    pub fn check(&self, state: &RiskState) -> Option<HaltReason> {
        let actual = state.actual_return();

        if actual >= self.max_daily_profit_rate {
            return Some(HaltReason::ProfitTarget {
                actual,
                limit: self.max_daily_profit_rate,
            });
        }
        if actual <= -self.max_daily_loss_rate {
            return Some(HaltReason::LossLimit {
                actual,
                limit: self.max_daily_loss_rate,
            });
        }
        if state.daily_trade_count >= self.max_daily_trades {
            return Some(HaltReason::TradeCount {
                count: state.daily_trade_count,
                limit: self.max_daily_trades,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limits() -> DailyLimits {
        DailyLimits {
            max_daily_profit_rate: dec!(0.05),
            max_daily_loss_rate: dec!(0.03),
            max_daily_trades: 100,
        }
    }

    fn state(invested: Decimal, profit: Decimal, trades: u32) -> RiskState {
        RiskState {
            daily_invested_amount: invested,
            daily_profit_amount: profit,
            daily_trade_count: trades,
            daily_return: Decimal::ZERO,
        }
    }

    #[test]
    fn test_no_halt_on_fresh_day() {
        assert_eq!(limits().check(&RiskState::default()), None);
    }

    #[test]
    fn test_profit_target() {
        let halt = limits().check(&state(dec!(100000), dec!(5000), 4)).unwrap();
        assert!(matches!(halt, HaltReason::ProfitTarget { .. }));
        assert!(halt.to_string().contains("profit target"));
    }

    #[test]
    fn test_loss_limit() {
        let halt = limits().check(&state(dec!(100000), dec!(-5000), 4)).unwrap();
        assert_eq!(
            halt,
            HaltReason::LossLimit {
                actual: dec!(-0.05),
                limit: dec!(0.03)
            }
        );
        assert!(halt.to_string().contains("loss limit"));
    }

    #[test]
    fn test_trade_count() {
        let halt = limits().check(&state(dec!(100000), dec!(10), 100)).unwrap();
        assert!(halt.to_string().contains("trade count"));
        assert_eq!(limits().check(&state(dec!(100000), dec!(10), 99)), None);
    }

    #[test]
    fn test_check_is_idempotent() {
        let limits = limits();
        let state = state(dec!(200000), dec!(-7000), 12);
        assert_eq!(limits.check(&state), limits.check(&state));
    }
}
