//! Mock collaborators for tests and the offline demo mode.
//!
//! Every port has a scriptable implementation: price feeds and candle
//! batches can be queued, failures injected, and all orders and events are
//! recorded for assertions.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::application::clock::Clock;
use crate::domain::errors::{AuthError, DataError, OrderError};
use crate::domain::events::SessionEvent;
use crate::domain::ports::{
    Authenticator, EventSink, ExecutionGateway, MarketDataService, SignalGenerator,
};
use crate::domain::trading::types::{
    BrokerSession, Candle, Fill, OptionContract, OrderRequest, Signal,
};

// ===== Clock =====

/// Deterministic clock: `now` starts at a fixed instant and `sleep`
/// advances it by the requested duration without waiting.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::zero());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        // Yield so concurrently spawned tasks (e.g. a shutdown trigger)
        // get a chance to run between ticks.
        tokio::task::yield_now().await;
    }
}

// ===== Authenticator =====

pub struct MockAuthenticator {
    failures_remaining: AtomicU32,
}

impl MockAuthenticator {
    pub fn new() -> Self {
        Self {
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// Fail the first `count` authentication attempts.
    pub fn failing(count: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(count),
        }
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn authenticate(&self) -> Result<BrokerSession, AuthError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(AuthError::Rejected {
                reason: "simulated auth failure".to_string(),
            });
        }
        Ok(BrokerSession {
            access_token: "mock-token".to_string(),
            user_id: "MOCK01".to_string(),
            user_name: "Mock Trader".to_string(),
            broker: "MOCK".to_string(),
            is_active: true,
        })
    }
}

// ===== Market data =====

pub struct MockMarketData {
    price_feed: Mutex<VecDeque<Decimal>>,
    last_price: Mutex<Decimal>,
    candles: Mutex<Vec<Candle>>,
    contracts: Mutex<Vec<OptionContract>>,
    price_failures_remaining: AtomicU32,
    walk_state: Option<AtomicU64>,
    walk_history: Mutex<VecDeque<Decimal>>,
}

impl MockMarketData {
    pub fn with_price(price: Decimal) -> Self {
        Self {
            price_feed: Mutex::new(VecDeque::new()),
            last_price: Mutex::new(price),
            candles: Mutex::new(Vec::new()),
            contracts: Mutex::new(Vec::new()),
            price_failures_remaining: AtomicU32::new(0),
            walk_state: None,
            walk_history: Mutex::new(VecDeque::new()),
        }
    }

    /// Self-driving pseudo-random walk for the offline demo: each price
    /// request perturbs the price and grows a synthetic candle history.
    pub fn random_walk(base_price: Decimal) -> Self {
        let mut mock = Self::with_price(base_price);
        mock.walk_state = Some(AtomicU64::new(1));
        mock
    }

    /// Queue prices returned by successive `latest_price` calls; once the
    /// queue drains the last value repeats.
    pub fn push_prices(&self, prices: &[Decimal]) {
        let mut feed = self.price_feed.lock().unwrap();
        feed.extend(prices.iter().copied());
    }

    pub fn set_candles(&self, candles: Vec<Candle>) {
        *self.candles.lock().unwrap() = candles;
    }

    pub fn set_contracts(&self, contracts: Vec<OptionContract>) {
        *self.contracts.lock().unwrap() = contracts;
    }

    /// Fail the next `count` price requests.
    pub fn fail_next_prices(&self, count: u32) {
        self.price_failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn last(&self) -> Decimal {
        *self.last_price.lock().unwrap()
    }

    fn advance_walk(&self, state: &AtomicU64) -> Decimal {
        let iteration = state.fetch_add(1, Ordering::SeqCst);
        let seed = iteration.wrapping_mul(1103515245).wrapping_add(12345);
        // -0.5% to +0.5% variance per step
        let variance = (((seed / 65536) % 1000) as f64 / 1000.0 - 0.5) * 0.01;

        let mut last = self.last_price.lock().unwrap();
        let price_f64 = last.to_f64().unwrap_or(100.0);
        let next = Decimal::from_f64(price_f64 * (1.0 + variance)).unwrap_or(*last);
        *last = next;

        let mut history = self.walk_history.lock().unwrap();
        history.push_back(next);
        while history.len() > 60 {
            history.pop_front();
        }
        next
    }
}

#[async_trait]
impl MarketDataService for MockMarketData {
    async fn latest_price(&self, instrument_key: &str) -> Result<Decimal, DataError> {
        let failures = self.price_failures_remaining.load(Ordering::SeqCst);
        if failures > 0 {
            self.price_failures_remaining.store(failures - 1, Ordering::SeqCst);
            return Err(DataError::Unavailable {
                reason: format!("simulated pricing outage for {}", instrument_key),
            });
        }

        if let Some(state) = &self.walk_state {
            return Ok(self.advance_walk(state));
        }

        let mut feed = self.price_feed.lock().unwrap();
        if let Some(price) = feed.pop_front() {
            *self.last_price.lock().unwrap() = price;
        }
        Ok(*self.last_price.lock().unwrap())
    }

    async fn intraday_candles(
        &self,
        _instrument_key: &str,
        _unit: &str,
        _interval: u32,
    ) -> Result<Vec<Candle>, DataError> {
        if self.walk_state.is_some() {
            let history = self.walk_history.lock().unwrap();
            let now = Utc::now();
            let candles = history
                .iter()
                .enumerate()
                .map(|(i, price)| Candle {
                    open: *price,
                    high: *price,
                    low: *price,
                    close: *price,
                    volume: Decimal::from(1000 + (i as i64 % 7) * 200),
                    timestamp: now - ChronoDuration::minutes((history.len() - i) as i64),
                })
                .collect();
            return Ok(candles);
        }
        Ok(self.candles.lock().unwrap().clone())
    }

    async fn option_contracts(
        &self,
        _underlying_key: &str,
        _expiry: NaiveDate,
    ) -> Result<Vec<OptionContract>, DataError> {
        Ok(self.contracts.lock().unwrap().clone())
    }
}

// ===== Strategy =====

/// Emits a scripted signal sequence; the last entry repeats forever.
pub struct ScriptedSignals {
    signals: Mutex<VecDeque<Signal>>,
    current: Mutex<Signal>,
}

impl ScriptedSignals {
    pub fn new(signals: &[Signal]) -> Self {
        Self {
            signals: Mutex::new(signals.iter().copied().collect()),
            current: Mutex::new(Signal::Hold),
        }
    }
}

impl SignalGenerator for ScriptedSignals {
    fn evaluate(&self, _candles: &[Candle]) -> Signal {
        let mut queue = self.signals.lock().unwrap();
        if let Some(next) = queue.pop_front() {
            *self.current.lock().unwrap() = next;
        }
        *self.current.lock().unwrap()
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

// ===== Execution gateway =====

pub struct MockExecutionGateway {
    fill_price_feed: Mutex<VecDeque<Decimal>>,
    last_fill_price: Mutex<Decimal>,
    placed: Mutex<Vec<OrderRequest>>,
    fills_by_client_id: Mutex<HashMap<String, Fill>>,
    failures_remaining: AtomicU32,
    partial_fill_quantity: Mutex<Option<u32>>,
}

impl MockExecutionGateway {
    pub fn new() -> Self {
        Self {
            fill_price_feed: Mutex::new(VecDeque::new()),
            last_fill_price: Mutex::new(Decimal::from(100)),
            placed: Mutex::new(Vec::new()),
            fills_by_client_id: Mutex::new(HashMap::new()),
            failures_remaining: AtomicU32::new(0),
            partial_fill_quantity: Mutex::new(None),
        }
    }

    /// Price stamped on all following fills (unless a queued price exists).
    pub fn set_fill_price(&self, price: Decimal) {
        *self.last_fill_price.lock().unwrap() = price;
    }

    /// Queue per-fill prices; once drained the last one repeats.
    pub fn push_fill_prices(&self, prices: &[Decimal]) {
        self.fill_price_feed.lock().unwrap().extend(prices.iter().copied());
    }

    /// Fail the next `count` order placements.
    pub fn fail_next_orders(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Fill only `quantity` units on the next order, then fill fully again.
    pub fn partial_fill_next(&self, quantity: u32) {
        *self.partial_fill_quantity.lock().unwrap() = Some(quantity);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }
}

impl Default for MockExecutionGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionGateway for MockExecutionGateway {
    async fn place_market_order(&self, request: &OrderRequest) -> Result<Fill, OrderError> {
        // Idempotent replay: a retried client order id returns the
        // original fill instead of executing twice.
        if let Some(existing) = self
            .fills_by_client_id
            .lock()
            .unwrap()
            .get(&request.client_order_id)
        {
            return Ok(existing.clone());
        }

        let failures = self.failures_remaining.load(Ordering::SeqCst);
        if failures > 0 {
            self.failures_remaining.store(failures - 1, Ordering::SeqCst);
            return Err(OrderError::Transport {
                reason: "simulated gateway outage".to_string(),
            });
        }

        self.placed.lock().unwrap().push(request.clone());

        let quantity = self
            .partial_fill_quantity
            .lock()
            .unwrap()
            .take()
            .map(|q| q.min(request.quantity))
            .unwrap_or(request.quantity);

        let price = {
            let mut last = self.last_fill_price.lock().unwrap();
            if let Some(next) = self.fill_price_feed.lock().unwrap().pop_front() {
                *last = next;
            }
            *last
        };

        let fill = Fill {
            fill_id: Uuid::new_v4().to_string(),
            order_id: Uuid::new_v4().to_string(),
            instrument_key: request.instrument_key.clone(),
            direction: request.side,
            quantity,
            price,
            timestamp: Utc::now(),
        };
        self.fills_by_client_id
            .lock()
            .unwrap()
            .insert(request.client_order_id.clone(), fill.clone());
        Ok(fill)
    }
}

// ===== Event sink =====

pub struct RecordingEventSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Default for RecordingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}
