use rust_decimal::Decimal;
use std::time::Duration;

use crate::domain::errors::ConfigError;

/// Hard session limits, loaded once at startup and immutable afterwards.
///
/// Every value must be strictly positive; a violated configuration fails
/// session startup instead of falling back to defaults.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Maximum tolerated unrealized loss on a single open trade.
    pub stop_loss_amount: Decimal,
    /// Unrealized profit at which an open trade is closed.
    pub take_profit_amount: Decimal,
    /// Maximum completed round-trips per day.
    pub max_trades_per_day: u32,
    /// Daily loss ceiling across realized and unrealized P&L.
    pub max_daily_loss: Decimal,
    /// Maximum session runtime before a forced clean stop.
    pub max_runtime: Duration,
    /// Pause between controller ticks.
    pub tick_interval: Duration,
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive_amounts = [
            ("STOP_LOSS", self.stop_loss_amount),
            ("TAKE_PROFIT", self.take_profit_amount),
            ("MAX_DAILY_LOSS", self.max_daily_loss),
        ];
        for (name, value) in positive_amounts {
            if value <= Decimal::ZERO {
                return Err(ConfigError::NonPositiveLimit {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.max_trades_per_day == 0 {
            return Err(ConfigError::NonPositiveLimit {
                name: "MAX_TRADES_PER_DAY".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_runtime.is_zero() {
            return Err(ConfigError::NonPositiveLimit {
                name: "MAX_RUNTIME".to_string(),
                value: "0".to_string(),
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::NonPositiveLimit {
                name: "TRADE_CHECK_INTERVAL".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_limits() -> RiskLimits {
        RiskLimits {
            stop_loss_amount: dec!(1000),
            take_profit_amount: dec!(2000),
            max_trades_per_day: 5,
            max_daily_loss: dec!(3000),
            max_runtime: Duration::from_secs(25200),
            tick_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_valid_limits_pass() {
        assert!(valid_limits().validate().is_ok());
    }

    #[test]
    fn test_negative_stop_loss_rejected() {
        let mut limits = valid_limits();
        limits.stop_loss_amount = dec!(-500);
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_zero_trades_per_day_rejected() {
        let mut limits = valid_limits();
        limits.max_trades_per_day = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let mut limits = valid_limits();
        limits.tick_interval = Duration::ZERO;
        assert!(limits.validate().is_err());
    }
}
