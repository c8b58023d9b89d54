//! Structured session events.
//!
//! Every state transition and every risk decision is surfaced as an event.
//! The core never formats human-readable text; sinks decide presentation.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::risk::governor::DenyReason;
use crate::domain::trading::session::{SessionState, SessionStats, StopCause};
use crate::domain::trading::types::{OrderSide, Signal, TradeRecord};

#[derive(Debug, Clone, Serialize)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    TickCompleted {
        tick: u64,
        price: Option<Decimal>,
        unrealized_pnl: Option<Decimal>,
    },
    SignalEvaluated {
        signal: Signal,
    },
    EntryDenied {
        reason: DenyReason,
    },
    OrderPlaced {
        instrument_key: String,
        side: OrderSide,
        quantity: u32,
    },
    FillApplied {
        record: TradeRecord,
    },
    RiskBreach {
        cause: StopCause,
    },
    FlattenRetry {
        attempt: u32,
        reason: String,
    },
    FlattenFailed {
        attempts: u32,
    },
    SessionEnded {
        cause: StopCause,
        stats: SessionStats,
    },
}
