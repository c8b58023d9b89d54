//! Tradesentry - Headless intraday trading session
//!
//! Runs one risk-governed trading session: authenticate, tick until a
//! limit fires or the operator stops it, flatten, report. Ctrl+C requests
//! a shutdown; the session always flattens before exiting.
//!
//! # Usage
//! ```sh
//! MODE=mock STOP_LOSS=1000 TAKE_PROFIT=2000 MAX_TRADES_PER_DAY=5 \
//! MAX_DAILY_LOSS=3000 MAX_RUNTIME=25200 TRADE_CHECK_INTERVAL=60 \
//! INSTRUMENT_KEY='NSE_INDEX|Nifty Bank' QUANTITY=15 cargo run
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

use tradesentry::application::clock::{Clock, SystemClock};
use tradesentry::application::controller::{Collaborators, SessionController};
use tradesentry::application::instruments::{AtmOptionResolver, FixedInstrumentResolver};
use tradesentry::application::shutdown::ShutdownSignal;
use tradesentry::application::strategy::EmaCrossoverStrategy;
use tradesentry::config::{Config, Mode};
use tradesentry::domain::ports::{
    Authenticator, EventSink, ExecutionGateway, InstrumentResolver, MarketDataService,
};
use tradesentry::domain::trading::session::SessionState;
use tradesentry::infrastructure::mock::{MockAuthenticator, MockExecutionGateway, MockMarketData};
use tradesentry::infrastructure::observability::TracingEventSink;
use tradesentry::infrastructure::trade_log::TradeLogWriter;
use tradesentry::infrastructure::upstox::{
    UpstoxAuthenticator, UpstoxClient, UpstoxExecutionGateway, UpstoxMarketData,
};

#[derive(Parser, Debug)]
#[command(name = "tradesentry", about = "Risk-governed intraday trading session")]
struct Cli {
    /// Override MODE from the environment (mock | upstox)
    #[arg(long)]
    mode: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    if let Some(mode) = &cli.mode {
        // SAFETY: set before any config read and before worker threads touch env
        unsafe { std::env::set_var("MODE", mode) };
    }

    info!("Tradesentry {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("configuration rejected, session not started")?;
    info!(
        "Configuration loaded: mode={:?}, instrument={}, quantity={}, option_mode={}",
        config.mode, config.session.instrument_key, config.session.quantity, config.option_mode
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let trade_log = config
        .trade_log_path
        .as_deref()
        .map(|path| TradeLogWriter::new(Path::new(path)));
    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink::new(trade_log));

    let (authenticator, market_data, gateway): (
        Arc<dyn Authenticator>,
        Arc<dyn MarketDataService>,
        Arc<dyn ExecutionGateway>,
    ) = match config.mode {
        Mode::Mock => {
            info!("Running against simulated market data (no broker)");
            let market = Arc::new(MockMarketData::random_walk(Decimal::from(47200)));
            let gateway = Arc::new(MockExecutionGateway::new());
            gateway.set_fill_price(market.last());
            (Arc::new(MockAuthenticator::new()), market, gateway)
        }
        Mode::Upstox => {
            let broker = config
                .broker
                .clone()
                .context("broker configuration missing for live mode")?;
            let client = Arc::new(UpstoxClient::new(&broker.base_url, Duration::from_secs(30)));
            (
                Arc::new(UpstoxAuthenticator::new(client.clone(), broker)),
                Arc::new(UpstoxMarketData::new(client.clone())),
                Arc::new(UpstoxExecutionGateway::new(client)),
            )
        }
    };

    let resolver: Arc<dyn InstrumentResolver> = if config.option_mode {
        Arc::new(AtmOptionResolver::new(
            market_data.clone(),
            &config.session.instrument_key,
            config.strike_step,
            clock.clone(),
        ))
    } else {
        Arc::new(FixedInstrumentResolver::new(&config.session.instrument_key))
    };

    let strategy = EmaCrossoverStrategy::new(config.strategy.clone())
        .context("strategy configuration rejected")?;

    let shutdown = ShutdownSignal::new();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, flattening...");
            ctrl_c_shutdown.trigger();
        }
    });

    let controller = SessionController::new(
        config.session.clone(),
        Collaborators {
            authenticator,
            market_data,
            strategy: Arc::new(strategy),
            gateway,
            resolver,
            events,
            clock,
        },
        shutdown,
    )
    .context("session controller rejected configuration")?;

    let outcome = controller.run().await;

    info!(
        "Final state: {} (cause: {}), trades: {}, realized P&L: {}",
        outcome.final_state,
        outcome.cause,
        outcome.stats.trades_executed_today,
        outcome.stats.realized_pnl_today
    );
    if !outcome.flat_confirmed {
        warn!("Position could NOT be flattened - manual review required");
    }

    if outcome.final_state == SessionState::Terminated || outcome.flat_confirmed {
        Ok(())
    } else {
        std::process::exit(2);
    }
}
