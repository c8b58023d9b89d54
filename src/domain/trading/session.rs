use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a trading session. `Halted` and `Terminated` are
/// terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Initializing,
    Authenticated,
    Running,
    Flattening,
    Halted,
    Terminated,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Halted | SessionState::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Initializing => "INITIALIZING",
            SessionState::Authenticated => "AUTHENTICATED",
            SessionState::Running => "RUNNING",
            SessionState::Flattening => "FLATTENING",
            SessionState::Halted => "HALTED",
            SessionState::Terminated => "TERMINATED",
        };
        write!(f, "{}", name)
    }
}

/// Why a session left the running loop. Risk breaches are designed
/// control-flow outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopCause {
    StopLoss,
    TakeProfit,
    MaxDailyLoss,
    MaxTrades,
    RuntimeExceeded,
    OperatorStop,
    AuthFailure,
    /// Persistent pricing failure while a position was open.
    DataLoss,
}

impl StopCause {
    /// Per-trade exits: the position is closed and the session resumes.
    pub fn is_resumable(self) -> bool {
        matches!(self, StopCause::StopLoss | StopCause::TakeProfit)
    }

    /// Clean stops end in `Terminated`; everything else ends in `Halted`.
    pub fn terminal_state(self) -> SessionState {
        match self {
            StopCause::RuntimeExceeded | StopCause::OperatorStop => SessionState::Terminated,
            _ => SessionState::Halted,
        }
    }
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopCause::StopLoss => "STOP_LOSS",
            StopCause::TakeProfit => "TAKE_PROFIT",
            StopCause::MaxDailyLoss => "MAX_DAILY_LOSS",
            StopCause::MaxTrades => "MAX_TRADES",
            StopCause::RuntimeExceeded => "RUNTIME_EXCEEDED",
            StopCause::OperatorStop => "OPERATOR_STOP",
            StopCause::AuthFailure => "AUTH_FAILURE",
            StopCause::DataLoss => "DATA_LOSS",
        };
        write!(f, "{}", name)
    }
}

/// Daily aggregates, reset only at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub trades_executed_today: u32,
    pub realized_pnl_today: Decimal,
    pub session_started_at: DateTime<Utc>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            trades_executed_today: 0,
            realized_pnl_today: Decimal::ZERO,
            session_started_at: started_at,
            last_tick_at: None,
        }
    }
}
