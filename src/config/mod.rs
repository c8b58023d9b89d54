//! Configuration module for Tradesentry.
//!
//! Structured configuration loading from environment variables, organized
//! by domain: Broker, Risk and Session. Risk limits and instrument identity
//! are required values; a missing or invalid one fails startup instead of
//! falling back to a default.

mod broker_config;
mod risk_env_config;

pub use broker_config::UpstoxEnvConfig;
pub use risk_env_config::load_risk_limits;

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::application::controller::SessionConfig;
use crate::application::strategy::EmaCrossoverConfig;
use crate::domain::errors::ConfigError;

/// Application execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Mock,
    Upstox,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "upstox" | "live" => Ok(Mode::Upstox),
            other => Err(ConfigError::InvalidValue {
                key: "MODE".to_string(),
                reason: format!("unknown mode '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub session: SessionConfig,
    pub strategy: EmaCrossoverConfig,
    pub broker: Option<UpstoxEnvConfig>,
    /// Trade the ATM weekly option on the underlying instead of the
    /// underlying itself.
    pub option_mode: bool,
    pub strike_step: Decimal,
    pub trade_log_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = match env::var("MODE") {
            Ok(raw) => raw.parse::<Mode>()?,
            Err(_) => Mode::Mock,
        };

        let session = SessionConfig {
            instrument_key: require_string("INSTRUMENT_KEY")?,
            quantity: require_u32("QUANTITY")?,
            limits: load_risk_limits()?,
            candle_unit: parse_string("UNIT", "minutes"),
            candle_interval: parse_u32("INTERVAL", 5)?,
            auth_max_attempts: parse_u32("AUTH_MAX_ATTEMPTS", 3)?,
            auth_retry_delay: Duration::from_secs(parse_u64("AUTH_RETRY_DELAY_SECONDS", 2)?),
            flatten_max_attempts: parse_u32("FLATTEN_MAX_ATTEMPTS", 5)?,
            flatten_retry_base_delay: Duration::from_millis(parse_u64(
                "FLATTEN_RETRY_BASE_DELAY_MS",
                500,
            )?),
            max_data_failures: parse_u32("MAX_DATA_FAILURES", 3)?,
        };
        session.validate()?;

        let strategy = EmaCrossoverConfig {
            fast_period: parse_usize("EMA_FAST_PERIOD", 9)?,
            slow_period: parse_usize("EMA_SLOW_PERIOD", 15)?,
            volume_window: parse_usize("VOLUME_WINDOW", 10)?,
            min_candles: parse_usize("MIN_CANDLES", 20)?,
        };

        let broker = match mode {
            Mode::Upstox => Some(UpstoxEnvConfig::from_env()?),
            Mode::Mock => None,
        };

        let option_mode = parse_bool("OPTION_MODE", false);
        let strike_step = parse_decimal("STRIKE_STEP", Decimal::from(50))?;
        if option_mode && strike_step <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveLimit {
                name: "STRIKE_STEP".to_string(),
                value: strike_step.to_string(),
            });
        }

        Ok(Self {
            mode,
            session,
            strategy,
            broker,
            option_mode,
            strike_step,
            trade_log_path: env::var("TRADE_LOG_FILE").ok(),
        })
    }
}

fn require_string(key: &str) -> Result<String, ConfigError> {
    let value = env::var(key).map_err(|_| ConfigError::MissingVar {
        key: key.to_string(),
    })?;
    if value.trim().is_empty() {
        return Err(ConfigError::MissingVar {
            key: key.to_string(),
        });
    }
    Ok(value)
}

fn require_u32(key: &str) -> Result<u32, ConfigError> {
    require_string(key)?
        .parse::<u32>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn require_decimal(key: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(&require_string(key)?).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn require_u64(key: &str) -> Result<u64, ConfigError> {
    require_string(key)?
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn parse_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_decimal(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    match env::var(key) {
        Ok(raw) => Decimal::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<bool>().ok())
        .unwrap_or(default)
}
