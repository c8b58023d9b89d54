//! Position & P&L Tracker
//!
//! The only writer of `Position` and `SessionStats`. Translates raw fill
//! notifications from the execution gateway into state changes and keeps
//! the append-only trade record audit trail.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::domain::trading::position::{Position, PositionSide};
use crate::domain::trading::session::SessionStats;
use crate::domain::trading::types::{Fill, OrderSide, TradeRecord};

pub struct PositionTracker {
    position: Position,
    stats: SessionStats,
    applied_fill_ids: HashSet<String>,
    records: Vec<TradeRecord>,
}

impl PositionTracker {
    pub fn new(instrument_key: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            position: Position::flat(instrument_key),
            stats: SessionStats::new(started_at),
            applied_fill_ids: HashSet::new(),
            records: Vec::new(),
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TradeRecord> {
        self.records
    }

    /// Reset daily aggregates. Called once, when the session enters RUNNING.
    pub fn start_session(&mut self, started_at: DateTime<Utc>) {
        self.stats = SessionStats::new(started_at);
    }

    pub fn mark_tick(&mut self, at: DateTime<Utc>) {
        self.stats.last_tick_at = Some(at);
    }

    /// Apply a fill. Returns the appended trade record, or `None` when the
    /// fill id was already applied (duplicate-fill protection).
    pub fn on_fill(&mut self, fill: &Fill) -> Option<TradeRecord> {
        if !self.applied_fill_ids.insert(fill.fill_id.clone()) {
            warn!(
                "Tracker: Ignoring duplicate fill {} for {}",
                fill.fill_id, fill.instrument_key
            );
            return None;
        }

        let realized_delta = if self.position.is_flat() {
            self.open_position(fill);
            Decimal::ZERO
        } else if Some(fill.direction) == self.position.closing_side() {
            self.close_quantity(fill)
        } else {
            self.average_in(fill);
            Decimal::ZERO
        };

        let record = TradeRecord {
            fill_id: fill.fill_id.clone(),
            direction: fill.direction,
            quantity: fill.quantity,
            price: fill.price,
            timestamp: fill.timestamp,
            resulting_position: self.position.clone(),
            realized_pnl_delta: realized_delta,
        };
        self.records.push(record.clone());
        Some(record)
    }

    fn open_position(&mut self, fill: &Fill) {
        let side = match fill.direction {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };
        self.position = Position {
            instrument_key: fill.instrument_key.clone(),
            side,
            quantity: fill.quantity,
            entry_price: Some(fill.price),
            opened_at: Some(fill.timestamp),
        };
        debug!(
            "Tracker: Opened {} {} x{} @ {}",
            self.position.side, fill.instrument_key, fill.quantity, fill.price
        );
    }

    /// Full or proportional partial close. The remaining quantity stays
    /// open at the original entry price; the trade counter increments only
    /// on the fill that takes the position to flat (round-trip counting).
    fn close_quantity(&mut self, fill: &Fill) -> Decimal {
        let close_qty = fill.quantity.min(self.position.quantity);
        if fill.quantity > self.position.quantity {
            warn!(
                "Tracker: Fill {} quantity {} exceeds open quantity {}; clamping",
                fill.fill_id, fill.quantity, self.position.quantity
            );
        }

        let entry = self.position.entry_price.unwrap_or(fill.price);
        let delta = (fill.price - entry) * Decimal::from(close_qty);
        let realized = match self.position.side {
            PositionSide::Short => -delta,
            _ => delta,
        };

        self.stats.realized_pnl_today += realized;
        self.position.quantity -= close_qty;

        if self.position.quantity == 0 {
            self.stats.trades_executed_today += 1;
            self.position = Position::flat(&self.position.instrument_key);
            debug!(
                "Tracker: Round-trip complete, realized {} (today: {}, trades: {})",
                realized, self.stats.realized_pnl_today, self.stats.trades_executed_today
            );
        }

        realized
    }

    /// A same-side fill against an open position averages into the entry
    /// price. The controller never produces one; a gateway replay must not
    /// corrupt state.
    fn average_in(&mut self, fill: &Fill) {
        warn!(
            "Tracker: Unexpected same-side fill {} while position open; averaging in",
            fill.fill_id
        );
        let open_qty = Decimal::from(self.position.quantity);
        let fill_qty = Decimal::from(fill.quantity);
        let entry = self.position.entry_price.unwrap_or(fill.price);
        let total = open_qty + fill_qty;
        if total > Decimal::ZERO {
            self.position.entry_price = Some((entry * open_qty + fill.price * fill_qty) / total);
        }
        self.position.quantity += fill.quantity;
    }
}
