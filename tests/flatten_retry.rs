//! Close-order retry behavior under gateway failures and partial fills.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use tradesentry::application::controller::{Collaborators, SessionConfig, SessionController};
use tradesentry::application::instruments::FixedInstrumentResolver;
use tradesentry::application::shutdown::ShutdownSignal;
use tradesentry::domain::events::SessionEvent;
use tradesentry::domain::risk::RiskLimits;
use tradesentry::domain::trading::session::SessionState;
use tradesentry::domain::trading::types::Signal;
use tradesentry::infrastructure::mock::{
    ManualClock, MockAuthenticator, MockExecutionGateway, MockMarketData, RecordingEventSink,
    ScriptedSignals,
};

const INSTRUMENT: &str = "NSE_INDEX|Nifty Bank";

fn session_config(quantity: u32, flatten_max_attempts: u32) -> SessionConfig {
    SessionConfig {
        instrument_key: INSTRUMENT.to_string(),
        quantity,
        limits: RiskLimits {
            stop_loss_amount: dec!(100),
            take_profit_amount: dec!(5000),
            max_trades_per_day: 5,
            max_daily_loss: dec!(10000),
            max_runtime: Duration::from_secs(300),
            tick_interval: Duration::from_secs(60),
        },
        candle_unit: "minutes".to_string(),
        candle_interval: 5,
        auth_max_attempts: 3,
        auth_retry_delay: Duration::from_secs(1),
        flatten_max_attempts,
        flatten_retry_base_delay: Duration::from_millis(100),
        max_data_failures: 2,
    }
}

struct Harness {
    market: Arc<MockMarketData>,
    gateway: Arc<MockExecutionGateway>,
    events: Arc<RecordingEventSink>,
}

fn build(config: SessionConfig) -> (Harness, SessionController) {
    let market = Arc::new(MockMarketData::with_price(dec!(100)));
    let gateway = Arc::new(MockExecutionGateway::new());
    let events = Arc::new(RecordingEventSink::new());

    let collab = Collaborators {
        authenticator: Arc::new(MockAuthenticator::new()),
        market_data: market.clone(),
        strategy: Arc::new(ScriptedSignals::new(&[Signal::Buy])),
        gateway: gateway.clone(),
        resolver: Arc::new(FixedInstrumentResolver::new(INSTRUMENT)),
        events: events.clone(),
        clock: Arc::new(ManualClock::default()),
    };
    let controller =
        SessionController::new(config, collab, ShutdownSignal::new()).expect("valid config");

    (
        Harness {
            market,
            gateway,
            events,
        },
        controller,
    )
}

/// Make the gateway fail `failures` placements once the entry has landed,
/// so only the close order is affected.
fn fail_after_entry(harness: &Harness, failures: u32) {
    let gateway = harness.gateway.clone();
    tokio::spawn(async move {
        for _ in 0..100_000 {
            if !gateway.placed_orders().is_empty() {
                gateway.fail_next_orders(failures);
                return;
            }
            tokio::task::yield_now().await;
        }
    });
}

fn flatten_retries(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::FlattenRetry { .. }))
        .count()
}

#[tokio::test]
async fn test_close_order_retries_until_success() {
    let config = session_config(1, 5);
    let (harness, controller) = build(config);

    // Entry at 1000, then the price collapses through the stop
    harness.market.push_prices(&[dec!(1000), dec!(800)]);
    harness.gateway.push_fill_prices(&[dec!(1000), dec!(800)]);
    fail_after_entry(&harness, 2);

    let outcome = controller.run().await;

    assert_eq!(flatten_retries(&harness.events.snapshot()), 2);
    assert!(outcome.flat_confirmed);
    assert_eq!(outcome.stats.trades_executed_today, 1);
    assert_eq!(outcome.stats.realized_pnl_today, dec!(-200));
}

#[tokio::test]
async fn test_flatten_exhaustion_halts_with_unflattened_position() {
    let config = session_config(1, 3);
    let (harness, controller) = build(config);

    harness.market.push_prices(&[dec!(1000), dec!(800)]);
    harness.gateway.push_fill_prices(&[dec!(1000)]);
    fail_after_entry(&harness, 1000);

    let outcome = controller.run().await;

    // A failed flatten always halts, never resumes or terminates cleanly
    assert_eq!(outcome.final_state, SessionState::Halted);
    assert!(!outcome.flat_confirmed);

    let events = harness.events.snapshot();
    assert_eq!(flatten_retries(&events), 3);
    let failed = events
        .iter()
        .any(|e| matches!(e, SessionEvent::FlattenFailed { attempts } if *attempts == 3));
    assert!(failed);
}

#[tokio::test]
async fn test_partial_close_fills_complete_the_flatten() {
    let config = session_config(10, 5);
    let (harness, controller) = build(config);

    // Entry 10 @ 100, stop hit at 90 (-100 across the position). The first
    // close order only fills 4 units; a follow-up closes the remaining 6.
    harness.market.push_prices(&[dec!(100), dec!(90)]);
    harness.gateway.push_fill_prices(&[dec!(100), dec!(90), dec!(90)]);

    let gateway = harness.gateway.clone();
    tokio::spawn(async move {
        for _ in 0..100_000 {
            if !gateway.placed_orders().is_empty() {
                gateway.partial_fill_next(4);
                return;
            }
            tokio::task::yield_now().await;
        }
    });

    let outcome = controller.run().await;

    assert!(outcome.flat_confirmed);
    // Round-trip counted once, on the fill that reached flat
    assert_eq!(outcome.stats.trades_executed_today, 1);
    assert_eq!(outcome.stats.realized_pnl_today, dec!(-100));

    let orders = harness.gateway.placed_orders();
    assert_eq!(orders.len(), 3, "entry, partial close, remainder close");
    assert_eq!(orders[1].quantity, 10);
    assert_eq!(orders[2].quantity, 6);
}
