//! End-to-end session flows against mock collaborators with a manual clock.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use tradesentry::application::controller::{Collaborators, SessionConfig, SessionController};
use tradesentry::application::instruments::FixedInstrumentResolver;
use tradesentry::application::shutdown::ShutdownSignal;
use tradesentry::domain::events::SessionEvent;
use tradesentry::domain::risk::RiskLimits;
use tradesentry::domain::trading::session::{SessionState, StopCause};
use tradesentry::domain::trading::types::{OrderSide, Signal};
use tradesentry::infrastructure::mock::{
    ManualClock, MockAuthenticator, MockExecutionGateway, MockMarketData, RecordingEventSink,
    ScriptedSignals,
};

const INSTRUMENT: &str = "NSE_INDEX|Nifty Bank";

fn limits(
    stop_loss: Decimal,
    take_profit: Decimal,
    max_trades: u32,
    max_daily_loss: Decimal,
    runtime_secs: u64,
) -> RiskLimits {
    RiskLimits {
        stop_loss_amount: stop_loss,
        take_profit_amount: take_profit,
        max_trades_per_day: max_trades,
        max_daily_loss,
        max_runtime: Duration::from_secs(runtime_secs),
        tick_interval: Duration::from_secs(60),
    }
}

fn session_config(limits: RiskLimits, quantity: u32) -> SessionConfig {
    SessionConfig {
        instrument_key: INSTRUMENT.to_string(),
        quantity,
        limits,
        candle_unit: "minutes".to_string(),
        candle_interval: 5,
        auth_max_attempts: 3,
        auth_retry_delay: Duration::from_secs(1),
        flatten_max_attempts: 5,
        flatten_retry_base_delay: Duration::from_millis(100),
        max_data_failures: 2,
    }
}

struct Harness {
    market: Arc<MockMarketData>,
    gateway: Arc<MockExecutionGateway>,
    events: Arc<RecordingEventSink>,
    shutdown: ShutdownSignal,
}

fn build(
    config: SessionConfig,
    signals: &[Signal],
    authenticator: MockAuthenticator,
) -> (Harness, SessionController) {
    let market = Arc::new(MockMarketData::with_price(dec!(100)));
    let gateway = Arc::new(MockExecutionGateway::new());
    let events = Arc::new(RecordingEventSink::new());
    let shutdown = ShutdownSignal::new();

    let collab = Collaborators {
        authenticator: Arc::new(authenticator),
        market_data: market.clone(),
        strategy: Arc::new(ScriptedSignals::new(signals)),
        gateway: gateway.clone(),
        resolver: Arc::new(FixedInstrumentResolver::new(INSTRUMENT)),
        events: events.clone(),
        clock: Arc::new(ManualClock::default()),
    };
    let controller =
        SessionController::new(config, collab, shutdown.clone()).expect("valid config");

    (
        Harness {
            market,
            gateway,
            events,
            shutdown,
        },
        controller,
    )
}

fn breach_causes(events: &[SessionEvent]) -> Vec<StopCause> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::RiskBreach { cause } => Some(*cause),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_stop_loss_closes_full_quantity_immediately() {
    // LONG 1 unit, unrealized P&L hits -1000 -> the very next controller
    // action is a close order for the full quantity.
    let config = session_config(limits(dec!(1000), dec!(2000), 5, dec!(5000), 600), 1);
    let (harness, controller) = build(config, &[Signal::Buy], MockAuthenticator::new());

    harness.market.push_prices(&[dec!(1100), dec!(100)]);
    harness.gateway.push_fill_prices(&[dec!(1100), dec!(100)]);

    let outcome = controller.run().await;

    let orders = harness.gateway.placed_orders();
    assert_eq!(orders.len(), 2, "entry and one close, no re-entry");
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[1].side, OrderSide::Sell);
    assert_eq!(orders[1].quantity, 1, "close covers the full quantity");

    assert!(breach_causes(&harness.events.snapshot()).contains(&StopCause::StopLoss));
    assert_eq!(outcome.stats.trades_executed_today, 1);
    assert_eq!(outcome.stats.realized_pnl_today, dec!(-1000));
    // The persisting BUY signal never re-enters; the session idles flat
    // until the runtime limit ends it cleanly.
    assert_eq!(outcome.cause, StopCause::RuntimeExceeded);
    assert_eq!(outcome.final_state, SessionState::Terminated);
    assert!(outcome.flat_confirmed);
}

#[tokio::test]
async fn test_take_profit_round_trip_resumes_session() {
    let config = session_config(limits(dec!(1000), dec!(1000), 5, dec!(10000), 600), 1);
    let (harness, controller) = build(
        config,
        &[Signal::Buy, Signal::Hold, Signal::Sell],
        MockAuthenticator::new(),
    );

    // Tick 1 enters long at 100; tick 2 prices at 1100 (+1000 -> take
    // profit); after the resume a SELL signal opens a short at 1100.
    harness.market.push_prices(&[dec!(100), dec!(1100)]);
    harness
        .gateway
        .push_fill_prices(&[dec!(100), dec!(1100), dec!(1100)]);

    let outcome = controller.run().await;

    let causes = breach_causes(&harness.events.snapshot());
    assert!(causes.contains(&StopCause::TakeProfit));
    assert!(causes.contains(&StopCause::RuntimeExceeded));

    // Two round-trips: the take-profit long and the runtime-flattened short
    assert_eq!(outcome.stats.trades_executed_today, 2);
    assert_eq!(outcome.stats.realized_pnl_today, dec!(1000));
    assert_eq!(outcome.final_state, SessionState::Terminated);
    assert!(outcome.flat_confirmed);
}

#[tokio::test]
async fn test_operator_stop_flattens_open_position() {
    let config = session_config(limits(dec!(1000), dec!(2000), 5, dec!(5000), 25200), 1);
    let (harness, controller) = build(config, &[Signal::Buy], MockAuthenticator::new());
    harness.gateway.push_fill_prices(&[dec!(100)]);

    // Request shutdown as soon as the entry order lands
    let gateway = harness.gateway.clone();
    let shutdown = harness.shutdown.clone();
    tokio::spawn(async move {
        for _ in 0..100_000 {
            if !gateway.placed_orders().is_empty() {
                shutdown.trigger();
                return;
            }
            tokio::task::yield_now().await;
        }
    });

    let outcome = controller.run().await;

    assert_eq!(outcome.cause, StopCause::OperatorStop);
    assert_eq!(outcome.final_state, SessionState::Terminated);
    assert!(outcome.flat_confirmed);
    let orders = harness.gateway.placed_orders();
    assert_eq!(orders.len(), 2, "entry plus forced close");
    assert_eq!(orders[1].side, OrderSide::Sell);
}

#[tokio::test]
async fn test_auth_failure_halts_after_bounded_retries() {
    let config = session_config(limits(dec!(1000), dec!(2000), 5, dec!(5000), 600), 1);
    let (harness, controller) = build(config, &[Signal::Buy], MockAuthenticator::failing(10));

    let outcome = controller.run().await;

    assert_eq!(outcome.cause, StopCause::AuthFailure);
    assert_eq!(outcome.final_state, SessionState::Halted);
    assert!(harness.gateway.placed_orders().is_empty());
    assert_eq!(outcome.stats.trades_executed_today, 0);
}

#[tokio::test]
async fn test_auth_recovers_within_retry_budget() {
    let config = session_config(limits(dec!(1000), dec!(2000), 5, dec!(5000), 120), 1);
    let (harness, controller) = build(config, &[Signal::Hold], MockAuthenticator::failing(2));

    let outcome = controller.run().await;

    // Third attempt succeeds; the session runs to its runtime limit
    assert_eq!(outcome.cause, StopCause::RuntimeExceeded);
    assert_eq!(outcome.final_state, SessionState::Terminated);
    assert!(harness.gateway.placed_orders().is_empty());
}

#[tokio::test]
async fn test_session_reports_terminal_events() {
    let config = session_config(limits(dec!(1000), dec!(2000), 5, dec!(5000), 120), 1);
    let (harness, controller) = build(config, &[Signal::Hold], MockAuthenticator::new());

    let outcome = controller.run().await;
    assert_eq!(outcome.final_state, SessionState::Terminated);

    let events = harness.events.snapshot();
    let ended = events
        .iter()
        .any(|e| matches!(e, SessionEvent::SessionEnded { cause, .. } if *cause == StopCause::RuntimeExceeded));
    assert!(ended, "terminal cause and stats must be reported");

    let reached_terminal = events.iter().any(
        |e| matches!(e, SessionEvent::StateChanged { to, .. } if *to == SessionState::Terminated),
    );
    assert!(reached_terminal);
}
