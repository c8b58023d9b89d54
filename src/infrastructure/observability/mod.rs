//! Event presentation.
//!
//! Renders structured session events as tracing log lines and optionally
//! mirrors fills into the CSV trade log. The core publishes plain events;
//! everything human-readable happens here.

use tracing::{error, info, warn};

use crate::domain::events::SessionEvent;
use crate::domain::ports::EventSink;
use crate::infrastructure::trade_log::TradeLogWriter;

pub struct TracingEventSink {
    trade_log: Option<TradeLogWriter>,
}

impl TracingEventSink {
    pub fn new(trade_log: Option<TradeLogWriter>) -> Self {
        Self { trade_log }
    }
}

impl EventSink for TracingEventSink {
    fn publish(&self, event: SessionEvent) {
        match &event {
            SessionEvent::StateChanged { from, to } => {
                info!("Session: {} -> {}", from, to);
            }
            SessionEvent::TickCompleted {
                tick,
                price,
                unrealized_pnl,
            } => match (price, unrealized_pnl) {
                (Some(price), Some(pnl)) => {
                    info!("Tick {}: price {}, unrealized P&L {}", tick, price, pnl);
                }
                _ => info!("Tick {}: no price available", tick),
            },
            SessionEvent::SignalEvaluated { signal } => {
                info!("Signal: {}", signal);
            }
            SessionEvent::EntryDenied { reason } => {
                warn!("Entry denied: {:?}", reason);
            }
            SessionEvent::OrderPlaced {
                instrument_key,
                side,
                quantity,
            } => {
                info!("Order: {} {} x{}", side, instrument_key, quantity);
            }
            SessionEvent::FillApplied { record } => {
                info!(
                    "Fill: {} x{} @ {} (realized delta {}, position now {} x{})",
                    record.direction,
                    record.quantity,
                    record.price,
                    record.realized_pnl_delta,
                    record.resulting_position.side,
                    record.resulting_position.quantity
                );
                if let Some(log) = &self.trade_log {
                    if let Err(e) = log.append(record) {
                        error!("Trade log write failed: {}", e);
                    }
                }
            }
            SessionEvent::RiskBreach { cause } => {
                warn!("Risk breach: {}", cause);
            }
            SessionEvent::FlattenRetry { attempt, reason } => {
                warn!("Flatten retry {}: {}", attempt, reason);
            }
            SessionEvent::FlattenFailed { attempts } => {
                error!(
                    "Flatten FAILED after {} attempts - position requires manual intervention",
                    attempts
                );
            }
            SessionEvent::SessionEnded { cause, stats } => {
                info!(
                    "Session ended ({}): {} trades, realized P&L {}",
                    cause, stats.trades_executed_today, stats.realized_pnl_today
                );
            }
        }
    }
}
