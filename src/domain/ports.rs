use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::errors::{AuthError, DataError, OrderError};
use crate::domain::events::SessionEvent;
use crate::domain::trading::types::{
    BrokerSession, Candle, Fill, OptionContract, OrderRequest, OrderSide, Signal,
};

// Need async_trait for async functions in traits
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<BrokerSession, AuthError>;
}

#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Latest traded price for an instrument.
    async fn latest_price(&self, instrument_key: &str) -> Result<Decimal, DataError>;

    /// Intraday candles, oldest first.
    async fn intraday_candles(
        &self,
        instrument_key: &str,
        unit: &str,
        interval: u32,
    ) -> Result<Vec<Candle>, DataError>;

    /// Option chain for an underlying at a given expiry.
    async fn option_contracts(
        &self,
        underlying_key: &str,
        expiry: NaiveDate,
    ) -> Result<Vec<OptionContract>, DataError>;
}

/// Strategy collaborator: pure signal derivation over candle history.
pub trait SignalGenerator: Send + Sync {
    fn evaluate(&self, candles: &[Candle]) -> Signal;
    fn name(&self) -> &str;
}

#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Place a market order and report its fill. Implementations must
    /// deduplicate by the request's client order id so retries are safe.
    async fn place_market_order(&self, request: &OrderRequest) -> Result<Fill, OrderError>;
}

/// What an entry signal resolves to: the instrument actually traded and
/// the order side that opens the exposure.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub instrument_key: String,
    pub side: OrderSide,
}

#[async_trait]
pub trait InstrumentResolver: Send + Sync {
    async fn resolve(
        &self,
        signal: Signal,
        underlying_price: Decimal,
    ) -> Result<ResolvedEntry, DataError>;
}

/// Presentation collaborator. Publishing must not block the tick loop.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: SessionEvent);
}
