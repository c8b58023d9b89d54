use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::trading::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Per-tick recommendation from the strategy collaborator. Carries no
/// sizing information; quantity always comes from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A market order request. The client order id is generated once per
/// logical order so gateway-level retries stay idempotent.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub instrument_key: String,
    pub side: OrderSide,
    pub quantity: u32,
}

impl OrderRequest {
    pub fn market(instrument_key: &str, side: OrderSide, quantity: u32) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            instrument_key: instrument_key.to_string(),
            side,
            quantity,
        }
    }
}

/// Fill feedback from the execution gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: String,
    pub order_id: String,
    pub instrument_key: String,
    pub direction: OrderSide,
    pub quantity: u32,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit record, one per applied fill. Created exclusively by
/// the position tracker and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub fill_id: String,
    pub direction: OrderSide,
    pub quantity: u32,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub resulting_position: Position,
    pub realized_pnl_delta: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "CE"),
            OptionType::Put => write!(f, "PE"),
        }
    }
}

/// One tradable contract from an option chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub instrument_key: String,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
}

/// Authenticated broker session details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSession {
    pub access_token: String,
    pub user_id: String,
    pub user_name: String,
    pub broker: String,
    pub is_active: bool,
}
