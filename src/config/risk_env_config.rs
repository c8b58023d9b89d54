//! Risk limit loading from environment variables.
//!
//! Every limit is required and strictly positive. There are deliberately
//! no defaults here: a session with an incomplete risk configuration must
//! not start.

use std::time::Duration;

use crate::config::{require_decimal, require_u64};
use crate::domain::errors::ConfigError;
use crate::domain::risk::RiskLimits;

pub fn load_risk_limits() -> Result<RiskLimits, ConfigError> {
    let limits = RiskLimits {
        stop_loss_amount: require_decimal("STOP_LOSS")?,
        take_profit_amount: require_decimal("TAKE_PROFIT")?,
        max_trades_per_day: require_u64("MAX_TRADES_PER_DAY")? as u32,
        max_daily_loss: require_decimal("MAX_DAILY_LOSS")?,
        max_runtime: Duration::from_secs(require_u64("MAX_RUNTIME")?),
        tick_interval: Duration::from_secs(require_u64("TRADE_CHECK_INTERVAL")?),
    };
    limits.validate()?;
    Ok(limits)
}
