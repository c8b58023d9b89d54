//! Risk Governor
//!
//! Stateless evaluation engine and sole authority for permitting trades or
//! demanding closure. Called twice per tick: a continuous check against the
//! open position and a pre-trade check before accepting a new entry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::risk::limits::RiskLimits;
use crate::domain::trading::position::Position;
use crate::domain::trading::session::{SessionStats, StopCause};

/// Why an open position must be closed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreachCause {
    StopLoss,
    TakeProfit,
    MaxDailyLoss,
}

impl From<BreachCause> for StopCause {
    fn from(cause: BreachCause) -> Self {
        match cause {
            BreachCause::StopLoss => StopCause::StopLoss,
            BreachCause::TakeProfit => StopCause::TakeProfit,
            BreachCause::MaxDailyLoss => StopCause::MaxDailyLoss,
        }
    }
}

/// Continuous-check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Hold,
    Close(BreachCause),
}

/// Why a new entry is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    MaxTrades,
    MaxDailyLoss,
}

impl From<DenyReason> for StopCause {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::MaxTrades => StopCause::MaxTrades,
            DenyReason::MaxDailyLoss => StopCause::MaxDailyLoss,
        }
    }
}

/// Pre-trade-check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    Allow,
    Deny(DenyReason),
}

/// Pure decision function over (position, stats, limits, price). Owns no
/// mutable state; no other component may override its outcomes.
pub struct RiskGovernor {
    limits: RiskLimits,
}

impl RiskGovernor {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Evaluate an open position against the per-trade and daily limits.
    ///
    /// Checked in order: stop loss, take profit, projected daily loss.
    /// When stop-loss and daily-loss conditions hold simultaneously the
    /// more specific per-trade cause is reported; the action is identical.
    pub fn continuous_check(
        &self,
        position: &Position,
        current_price: Decimal,
        stats: &SessionStats,
    ) -> TickDecision {
        if position.is_flat() {
            return TickDecision::Hold;
        }

        let unrealized = position.unrealized_pnl(current_price);

        if unrealized <= -self.limits.stop_loss_amount {
            return TickDecision::Close(BreachCause::StopLoss);
        }
        if unrealized >= self.limits.take_profit_amount {
            return TickDecision::Close(BreachCause::TakeProfit);
        }
        // A daily-loss breach that is about to happen must close before it
        // is realized, not after.
        if stats.realized_pnl_today + unrealized <= -self.limits.max_daily_loss {
            return TickDecision::Close(BreachCause::MaxDailyLoss);
        }

        TickDecision::Hold
    }

    /// Decide whether a new entry is permitted for a flat position.
    pub fn pre_trade_check(&self, stats: &SessionStats) -> EntryDecision {
        if stats.trades_executed_today >= self.limits.max_trades_per_day {
            return EntryDecision::Deny(DenyReason::MaxTrades);
        }
        if stats.realized_pnl_today <= -self.limits.max_daily_loss {
            return EntryDecision::Deny(DenyReason::MaxDailyLoss);
        }
        EntryDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::position::PositionSide;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn limits() -> RiskLimits {
        RiskLimits {
            stop_loss_amount: dec!(1000),
            take_profit_amount: dec!(2000),
            max_trades_per_day: 5,
            max_daily_loss: dec!(3000),
            max_runtime: Duration::from_secs(25200),
            tick_interval: Duration::from_secs(60),
        }
    }

    fn open_long(quantity: u32, entry: Decimal) -> Position {
        Position {
            instrument_key: "NSE_INDEX|Nifty Bank".to_string(),
            side: PositionSide::Long,
            quantity,
            entry_price: Some(entry),
            opened_at: Some(Utc::now()),
        }
    }

    fn stats() -> SessionStats {
        SessionStats::new(Utc::now())
    }

    #[test]
    fn test_stop_loss_breach_closes() {
        let governor = RiskGovernor::new(limits());
        // LONG 1 @ 1100, price 100 -> unrealized -1000, exactly at the limit
        let position = open_long(1, dec!(1100));
        let decision = governor.continuous_check(&position, dec!(100), &stats());
        assert_eq!(decision, TickDecision::Close(BreachCause::StopLoss));
    }

    #[test]
    fn test_loss_within_limit_holds() {
        let governor = RiskGovernor::new(limits());
        let position = open_long(1, dec!(1100));
        let decision = governor.continuous_check(&position, dec!(200), &stats());
        assert_eq!(decision, TickDecision::Hold);
    }

    #[test]
    fn test_take_profit_breach_closes() {
        let governor = RiskGovernor::new(limits());
        let position = open_long(2, dec!(500));
        // +1000 per unit * 2 = +2000 unrealized
        let decision = governor.continuous_check(&position, dec!(1500), &stats());
        assert_eq!(decision, TickDecision::Close(BreachCause::TakeProfit));
    }

    #[test]
    fn test_projected_daily_loss_closes_before_realization() {
        let governor = RiskGovernor::new(limits());
        let position = open_long(1, dec!(1000));
        let mut stats = stats();
        stats.realized_pnl_today = dec!(-2500);
        // unrealized -500, projected -3000 hits the ceiling
        let decision = governor.continuous_check(&position, dec!(500), &stats);
        assert_eq!(decision, TickDecision::Close(BreachCause::MaxDailyLoss));
    }

    #[test]
    fn test_stop_loss_wins_tie_break_over_daily_loss() {
        let governor = RiskGovernor::new(limits());
        let position = open_long(1, dec!(1100));
        let mut stats = stats();
        stats.realized_pnl_today = dec!(-2500);
        // unrealized -1000 breaches both; the per-trade cause is reported
        let decision = governor.continuous_check(&position, dec!(100), &stats);
        assert_eq!(decision, TickDecision::Close(BreachCause::StopLoss));
    }

    #[test]
    fn test_flat_position_always_holds() {
        let governor = RiskGovernor::new(limits());
        let position = Position::flat("NSE_INDEX|Nifty Bank");
        let decision = governor.continuous_check(&position, dec!(1), &stats());
        assert_eq!(decision, TickDecision::Hold);
    }

    #[test]
    fn test_short_position_stop_loss() {
        let governor = RiskGovernor::new(limits());
        let mut position = open_long(1, dec!(100));
        position.side = PositionSide::Short;
        // Short loses as price rises: 100 -> 1100 is -1000
        let decision = governor.continuous_check(&position, dec!(1100), &stats());
        assert_eq!(decision, TickDecision::Close(BreachCause::StopLoss));
    }

    #[test]
    fn test_pre_trade_denies_at_trade_cap() {
        let governor = RiskGovernor::new(limits());
        let mut stats = stats();
        stats.trades_executed_today = 5;
        assert_eq!(
            governor.pre_trade_check(&stats),
            EntryDecision::Deny(DenyReason::MaxTrades)
        );
    }

    #[test]
    fn test_pre_trade_denies_at_daily_loss_ceiling() {
        let governor = RiskGovernor::new(limits());
        let mut stats = stats();
        stats.realized_pnl_today = dec!(-3000);
        assert_eq!(
            governor.pre_trade_check(&stats),
            EntryDecision::Deny(DenyReason::MaxDailyLoss)
        );
    }

    #[test]
    fn test_pre_trade_allows_under_limits() {
        let governor = RiskGovernor::new(limits());
        let mut stats = stats();
        stats.trades_executed_today = 4;
        stats.realized_pnl_today = dec!(-2999);
        assert_eq!(governor.pre_trade_check(&stats), EntryDecision::Allow);
    }
}
