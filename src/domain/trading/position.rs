use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::trading::types::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
            PositionSide::Flat => write!(f, "FLAT"),
        }
    }
}

/// The single open position of a session.
///
/// Invariant: `quantity > 0` exactly when `side != Flat` exactly when
/// `entry_price` and `opened_at` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub instrument_key: String,
    pub side: PositionSide,
    pub quantity: u32,
    pub entry_price: Option<Decimal>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn flat(instrument_key: &str) -> Self {
        Self {
            instrument_key: instrument_key.to_string(),
            side: PositionSide::Flat,
            quantity: 0,
            entry_price: None,
            opened_at: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }

    /// Signed unrealized P&L at the given price; zero when flat.
    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        let Some(entry) = self.entry_price else {
            return Decimal::ZERO;
        };
        let delta = (current_price - entry) * Decimal::from(self.quantity);
        match self.side {
            PositionSide::Long => delta,
            PositionSide::Short => -delta,
            PositionSide::Flat => Decimal::ZERO,
        }
    }

    /// The order side that reduces this position, if any.
    pub fn closing_side(&self) -> Option<OrderSide> {
        match self.side {
            PositionSide::Long => Some(OrderSide::Sell),
            PositionSide::Short => Some(OrderSide::Buy),
            PositionSide::Flat => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_position(quantity: u32, entry: Decimal) -> Position {
        Position {
            instrument_key: "NSE_INDEX|Nifty Bank".to_string(),
            side: PositionSide::Long,
            quantity,
            entry_price: Some(entry),
            opened_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_unrealized_pnl_long() {
        let position = long_position(10, dec!(100));
        assert_eq!(position.unrealized_pnl(dec!(110)), dec!(100));
        assert_eq!(position.unrealized_pnl(dec!(95)), dec!(-50));
    }

    #[test]
    fn test_unrealized_pnl_short() {
        let mut position = long_position(5, dec!(200));
        position.side = PositionSide::Short;
        assert_eq!(position.unrealized_pnl(dec!(180)), dec!(100));
        assert_eq!(position.unrealized_pnl(dec!(210)), dec!(-50));
    }

    #[test]
    fn test_flat_has_no_pnl_and_no_closing_side() {
        let position = Position::flat("NSE_INDEX|Nifty Bank");
        assert_eq!(position.unrealized_pnl(dec!(123)), Decimal::ZERO);
        assert!(position.closing_side().is_none());
    }

    #[test]
    fn test_closing_side_opposes_position() {
        let position = long_position(1, dec!(100));
        assert_eq!(position.closing_side(), Some(OrderSide::Sell));
    }
}
