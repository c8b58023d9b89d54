//! Session Controller
//!
//! Drives a trading session from start to a terminal state, one tick at a
//! time. Entry orders are only placed from RUNNING; close orders only from
//! FLATTENING. The loop never ends with an open, unmonitored position: any
//! exit path forces a flatten first.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::application::clock::Clock;
use crate::application::shutdown::ShutdownSignal;
use crate::application::tracker::PositionTracker;
use crate::domain::errors::ConfigError;
use crate::domain::events::SessionEvent;
use crate::domain::ports::{
    Authenticator, EventSink, ExecutionGateway, InstrumentResolver, MarketDataService,
    SignalGenerator,
};
use crate::domain::risk::{EntryDecision, RiskGovernor, TickDecision};
use crate::domain::trading::session::{SessionState, SessionStats, StopCause};
use crate::domain::trading::types::{OrderRequest, Signal, TradeRecord};

/// Static session parameters, validated once at INITIALIZING.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Underlying instrument: priced every tick and fed to the strategy.
    pub instrument_key: String,
    /// Fixed order quantity; signals carry no sizing information.
    pub quantity: u32,
    pub limits: crate::domain::risk::RiskLimits,
    pub candle_unit: String,
    pub candle_interval: u32,
    pub auth_max_attempts: u32,
    pub auth_retry_delay: Duration,
    pub flatten_max_attempts: u32,
    pub flatten_retry_base_delay: Duration,
    /// Consecutive pricing failures tolerated while a position is open.
    pub max_data_failures: u32,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        if self.instrument_key.trim().is_empty() {
            return Err(ConfigError::MissingVar {
                key: "INSTRUMENT_KEY".to_string(),
            });
        }
        if self.quantity == 0 {
            return Err(ConfigError::NonPositiveLimit {
                name: "QUANTITY".to_string(),
                value: "0".to_string(),
            });
        }
        if self.auth_max_attempts == 0 || self.flatten_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RETRY_ATTEMPTS".to_string(),
                reason: "retry attempt counts must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// External collaborators, all behind narrow ports.
pub struct Collaborators {
    pub authenticator: Arc<dyn Authenticator>,
    pub market_data: Arc<dyn MarketDataService>,
    pub strategy: Arc<dyn SignalGenerator>,
    pub gateway: Arc<dyn ExecutionGateway>,
    pub resolver: Arc<dyn InstrumentResolver>,
    pub events: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

/// Terminal report of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub final_state: SessionState,
    pub cause: StopCause,
    pub stats: SessionStats,
    pub records: Vec<TradeRecord>,
    /// False only when the bounded flatten retries were exhausted with
    /// quantity still open; manual intervention is required.
    pub flat_confirmed: bool,
}

pub struct SessionController {
    config: SessionConfig,
    collab: Collaborators,
    shutdown: ShutdownSignal,
    governor: RiskGovernor,
    tracker: PositionTracker,
    state: SessionState,
    last_known_price: Option<Decimal>,
    last_acted_signal: Option<Signal>,
    data_failures: u32,
    tick: u64,
}

impl SessionController {
    /// INITIALIZING: validates the configuration and refuses to construct
    /// a controller from an invalid one. No defaulting.
    pub fn new(
        config: SessionConfig,
        collab: Collaborators,
        shutdown: ShutdownSignal,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = collab.clock.now();
        let governor = RiskGovernor::new(config.limits.clone());
        let tracker = PositionTracker::new(&config.instrument_key, now);
        Ok(Self {
            config,
            collab,
            shutdown,
            governor,
            tracker,
            state: SessionState::Initializing,
            last_known_price: None,
            last_acted_signal: None,
            data_failures: 0,
            tick: 0,
        })
    }

    /// Run the session to completion and report the terminal outcome.
    pub async fn run(mut self) -> SessionOutcome {
        info!(
            "SessionController: Starting session for {} (strategy: {})",
            self.config.instrument_key,
            self.collab.strategy.name()
        );

        if !self.authenticate().await {
            return self.finish(StopCause::AuthFailure, true);
        }

        self.set_state(SessionState::Running);
        self.tracker.start_session(self.collab.clock.now());

        let (cause, flat_confirmed) = loop {
            let cause = self.run_loop().await;
            self.set_state(SessionState::Flattening);
            if matches!(
                cause,
                StopCause::StopLoss
                    | StopCause::TakeProfit
                    | StopCause::MaxDailyLoss
                    | StopCause::MaxTrades
                    | StopCause::RuntimeExceeded
            ) {
                self.collab.events.publish(SessionEvent::RiskBreach { cause });
            }

            let flat = self.flatten().await;
            if flat && cause.is_resumable() && !self.shutdown.is_triggered() {
                info!(
                    "SessionController: Position closed ({}), resuming tick loop",
                    cause
                );
                self.set_state(SessionState::Running);
                continue;
            }
            break (cause, flat);
        };

        self.finish(cause, flat_confirmed)
    }

    /// AUTHENTICATED is only reached through here; only the authentication
    /// step is retried.
    async fn authenticate(&mut self) -> bool {
        for attempt in 1..=self.config.auth_max_attempts {
            match self.collab.authenticator.authenticate().await {
                Ok(session) => {
                    info!(
                        "SessionController: Authenticated as {} ({})",
                        session.user_id, session.broker
                    );
                    self.set_state(SessionState::Authenticated);
                    return true;
                }
                Err(e) => {
                    warn!(
                        "SessionController: Authentication attempt {}/{} failed: {}",
                        attempt, self.config.auth_max_attempts, e
                    );
                    if attempt < self.config.auth_max_attempts {
                        self.collab.clock.sleep(self.config.auth_retry_delay).await;
                    }
                }
            }
        }
        error!("SessionController: Authentication exhausted all attempts");
        false
    }

    /// The RUNNING tick loop. Returns the cause that demands a flatten.
    async fn run_loop(&mut self) -> StopCause {
        loop {
            if self.shutdown.is_triggered() {
                return StopCause::OperatorStop;
            }

            self.tick += 1;
            let now = self.collab.clock.now();
            self.tracker.mark_tick(now);

            let elapsed = now
                .signed_duration_since(self.tracker.stats().session_started_at)
                .to_std()
                .unwrap_or_default();
            if elapsed >= self.config.limits.max_runtime {
                info!(
                    "SessionController: Max runtime reached after {:?} (tick {})",
                    elapsed, self.tick
                );
                return StopCause::RuntimeExceeded;
            }

            if let Some(cause) = self.execute_tick().await {
                return cause;
            }

            tokio::select! {
                _ = self.collab.clock.sleep(self.config.limits.tick_interval) => {}
                _ = self.shutdown.wait() => return StopCause::OperatorStop,
            }
        }
    }

    /// One tick body: price, continuous check, then signal handling while
    /// flat. `Some(cause)` demands a transition to FLATTENING.
    async fn execute_tick(&mut self) -> Option<StopCause> {
        let position_open = !self.tracker.position().is_flat();
        // While flat the underlying is priced (it feeds entry resolution);
        // with an open position the traded instrument itself is priced.
        let priced_instrument = if position_open {
            self.tracker.position().instrument_key.clone()
        } else {
            self.config.instrument_key.clone()
        };

        let price = match self.collab.market_data.latest_price(&priced_instrument).await {
            Ok(price) => {
                self.data_failures = 0;
                if position_open {
                    self.last_known_price = Some(price);
                }
                price
            }
            Err(e) => {
                if position_open {
                    self.data_failures += 1;
                    warn!(
                        "SessionController: Pricing failure {}/{} with open position: {}",
                        self.data_failures, self.config.max_data_failures, e
                    );
                    if self.data_failures > self.config.max_data_failures {
                        // An un-monitorable open position is itself a risk
                        // breach; close protectively at the last known price.
                        return Some(StopCause::DataLoss);
                    }
                } else {
                    debug!("SessionController: Pricing failure while flat: {}", e);
                }
                // Valuation falls back to the last known price until the
                // feed recovers or the protective close fires.
                let fallback = if position_open { self.last_known_price } else { None };
                self.publish_tick(fallback);
                return None;
            }
        };

        if position_open {
            let decision =
                self.governor
                    .continuous_check(self.tracker.position(), price, self.tracker.stats());
            self.publish_tick(Some(price));
            if let TickDecision::Close(breach) = decision {
                info!(
                    "SessionController: Continuous check demands close ({:?}) at {}",
                    breach, price
                );
                return Some(breach.into());
            }
            return None;
        }

        let outcome = self.try_enter(price).await;
        self.publish_tick(Some(price));
        outcome
    }

    /// Signal fetch and entry path, only reachable while flat.
    async fn try_enter(&mut self, underlying_price: Decimal) -> Option<StopCause> {
        let candles = match self
            .collab
            .market_data
            .intraday_candles(
                &self.config.instrument_key,
                &self.config.candle_unit,
                self.config.candle_interval,
            )
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                debug!("SessionController: Candle fetch failed, skipping tick: {}", e);
                return None;
            }
        };

        let signal = self.collab.strategy.evaluate(&candles);
        self.collab
            .events
            .publish(SessionEvent::SignalEvaluated { signal });
        if signal == Signal::Hold || self.last_acted_signal == Some(signal) {
            return None;
        }

        match self.governor.pre_trade_check(self.tracker.stats()) {
            EntryDecision::Deny(reason) => {
                info!("SessionController: Entry denied ({:?}), no order placed", reason);
                self.collab.events.publish(SessionEvent::EntryDenied { reason });
                // No further trading is possible today; stop the session.
                Some(reason.into())
            }
            EntryDecision::Allow => {
                self.place_entry(signal, underlying_price).await;
                None
            }
        }
    }

    async fn place_entry(&mut self, signal: Signal, underlying_price: Decimal) {
        let entry = match self.collab.resolver.resolve(signal, underlying_price).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    "SessionController: Could not resolve instrument for {}: {}",
                    signal, e
                );
                return;
            }
        };

        let request = OrderRequest::market(&entry.instrument_key, entry.side, self.config.quantity);
        self.collab.events.publish(SessionEvent::OrderPlaced {
            instrument_key: request.instrument_key.clone(),
            side: request.side,
            quantity: request.quantity,
        });

        match self.collab.gateway.place_market_order(&request).await {
            Ok(fill) => {
                info!(
                    "SessionController: Entry filled {} {} x{} @ {}",
                    fill.direction, fill.instrument_key, fill.quantity, fill.price
                );
                self.last_known_price = Some(fill.price);
                self.last_acted_signal = Some(signal);
                if let Some(record) = self.tracker.on_fill(&fill) {
                    self.collab.events.publish(SessionEvent::FillApplied { record });
                }
            }
            Err(e) => {
                // Transient: the signal is re-evaluated next tick.
                warn!("SessionController: Entry order failed: {}", e);
            }
        }
    }

    /// FLATTENING: close the full open quantity, retrying against transient
    /// gateway failures. Returns true once the position is confirmed flat.
    async fn flatten(&mut self) -> bool {
        if self.tracker.position().is_flat() {
            return true;
        }

        let mut attempt = 0u32;
        let mut request = self.close_request();

        while !self.tracker.position().is_flat() && attempt < self.config.flatten_max_attempts {
            attempt += 1;
            let open_before = self.tracker.position().quantity;

            match self.collab.gateway.place_market_order(&request).await {
                Ok(fill) => {
                    if let Some(record) = self.tracker.on_fill(&fill) {
                        self.collab.events.publish(SessionEvent::FillApplied { record });
                    }
                    let remaining = self.tracker.position().quantity;
                    if remaining > 0 && remaining < open_before {
                        // Partial close: fresh order (and id) for the rest,
                        // with the retry budget restored.
                        warn!(
                            "SessionController: Partial close, {} of {} still open",
                            remaining, open_before
                        );
                        attempt = 0;
                        request = self.close_request();
                    }
                }
                Err(e) => {
                    warn!(
                        "SessionController: Close order attempt {}/{} failed: {}",
                        attempt, self.config.flatten_max_attempts, e
                    );
                    self.collab.events.publish(SessionEvent::FlattenRetry {
                        attempt,
                        reason: e.to_string(),
                    });
                    if attempt < self.config.flatten_max_attempts {
                        let backoff = self.config.flatten_retry_base_delay
                            * 2u32.saturating_pow(attempt - 1);
                        self.collab.clock.sleep(backoff).await;
                    }
                }
            }
        }

        if self.tracker.position().is_flat() {
            info!("SessionController: Position confirmed flat");
            true
        } else {
            error!(
                "SessionController: FAILED to flatten after {} attempts; {} x{} remains open",
                self.config.flatten_max_attempts,
                self.tracker.position().instrument_key,
                self.tracker.position().quantity
            );
            self.collab.events.publish(SessionEvent::FlattenFailed {
                attempts: self.config.flatten_max_attempts,
            });
            false
        }
    }

    fn close_request(&self) -> OrderRequest {
        let position = self.tracker.position();
        // closing_side is always present here: flatten() returns before
        // building a request when the position is flat.
        let side = position
            .closing_side()
            .unwrap_or(crate::domain::trading::types::OrderSide::Sell);
        OrderRequest::market(&position.instrument_key, side, position.quantity)
    }

    /// Enter the terminal state and report the final outcome. A failed
    /// flatten always halts, even for causes that would terminate cleanly.
    fn finish(mut self, cause: StopCause, flat_confirmed: bool) -> SessionOutcome {
        let terminal = if flat_confirmed {
            cause.terminal_state()
        } else {
            SessionState::Halted
        };
        self.set_state(terminal);

        let stats = self.tracker.stats().clone();
        self.collab.events.publish(SessionEvent::SessionEnded {
            cause,
            stats: stats.clone(),
        });
        info!(
            "SessionController: Session ended ({}) - trades: {}, realized P&L: {}",
            cause, stats.trades_executed_today, stats.realized_pnl_today
        );

        SessionOutcome {
            final_state: terminal,
            cause,
            stats,
            records: self.tracker.into_records(),
            flat_confirmed,
        }
    }

    fn set_state(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        debug!("SessionController: {} -> {}", self.state, to);
        self.collab.events.publish(SessionEvent::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
    }

    fn publish_tick(&self, price: Option<Decimal>) {
        let unrealized = price.map(|p| self.tracker.position().unrealized_pnl(p));
        self.collab.events.publish(SessionEvent::TickCompleted {
            tick: self.tick,
            price,
            unrealized_pnl: unrealized,
        });
    }
}
