//! EMA crossover signal generation.
//!
//! Fast/slow exponential moving average crossover with volume, momentum
//! and trend-slope confirmation filters. Trend continuation (a widening
//! EMA spread in an established trend) also signals, so a session started
//! mid-trend is not blind to it.

use rust_decimal::prelude::ToPrimitive;
use ta::Next;
use ta::indicators::ExponentialMovingAverage;
use tracing::debug;

use crate::domain::errors::ConfigError;
use crate::domain::ports::SignalGenerator;
use crate::domain::trading::types::{Candle, Signal};

#[derive(Debug, Clone)]
pub struct EmaCrossoverConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Window for the average-volume confirmation filter.
    pub volume_window: usize,
    /// Minimum candle history before any signal is emitted.
    pub min_candles: usize,
}

impl Default for EmaCrossoverConfig {
    fn default() -> Self {
        Self {
            fast_period: 9,
            slow_period: 15,
            volume_window: 10,
            min_candles: 20,
        }
    }
}

pub struct EmaCrossoverStrategy {
    config: EmaCrossoverConfig,
}

impl EmaCrossoverStrategy {
    pub fn new(config: EmaCrossoverConfig) -> Result<Self, ConfigError> {
        if config.fast_period == 0 || config.slow_period == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMA_PERIODS".to_string(),
                reason: "periods must be positive".to_string(),
            });
        }
        if config.fast_period >= config.slow_period {
            return Err(ConfigError::InvalidValue {
                key: "EMA_PERIODS".to_string(),
                reason: format!(
                    "fast period {} must be below slow period {}",
                    config.fast_period, config.slow_period
                ),
            });
        }
        if config.min_candles < config.slow_period + 3 {
            return Err(ConfigError::InvalidValue {
                key: "MIN_CANDLES".to_string(),
                reason: "history must cover the slow EMA warmup".to_string(),
            });
        }
        Ok(Self { config })
    }
}

impl SignalGenerator for EmaCrossoverStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Signal {
        let n = candles.len();
        if n < self.config.min_candles {
            return Signal::Hold;
        }
        let Ok(mut fast_ema) = ExponentialMovingAverage::new(self.config.fast_period) else {
            return Signal::Hold;
        };
        let Ok(mut slow_ema) = ExponentialMovingAverage::new(self.config.slow_period) else {
            return Signal::Hold;
        };

        let mut fast = Vec::with_capacity(n);
        let mut slow = Vec::with_capacity(n);
        for candle in candles {
            let close = candle.close.to_f64().unwrap_or(0.0);
            fast.push(fast_ema.next(close));
            slow.push(slow_ema.next(close));
        }

        let close = candles[n - 1].close.to_f64().unwrap_or(0.0);
        let prev_close = candles[n - 2].close.to_f64().unwrap_or(0.0);
        let (cur_fast, prev_fast) = (fast[n - 1], fast[n - 2]);
        let (cur_slow, prev_slow) = (slow[n - 1], slow[n - 2]);

        let window = self.config.volume_window.min(n);
        let avg_volume = candles[n - window..]
            .iter()
            .map(|c| c.volume.to_f64().unwrap_or(0.0))
            .sum::<f64>()
            / window as f64;
        let volume_ok = candles[n - 1].volume.to_f64().unwrap_or(0.0) > avg_volume;

        let bullish_crossover = prev_fast <= prev_slow && cur_fast > cur_slow;
        let bearish_crossover = prev_fast >= prev_slow && cur_fast < cur_slow;
        let price_above = close > cur_fast && close > cur_slow;
        let price_below = close < cur_fast && close < cur_slow;
        let rising = cur_fast > fast[n - 3];
        let falling = cur_fast < fast[n - 3];

        if bullish_crossover && price_above && volume_ok && close > prev_close && rising {
            debug!(
                "EmaCrossover: bullish crossover (fast={:.2}, slow={:.2})",
                cur_fast, cur_slow
            );
            return Signal::Buy;
        }
        if bearish_crossover && price_below && volume_ok && close < prev_close && falling {
            debug!(
                "EmaCrossover: bearish crossover (fast={:.2}, slow={:.2})",
                cur_fast, cur_slow
            );
            return Signal::Sell;
        }

        // Trend continuation: established trend with a widening EMA spread
        let uptrend = cur_fast > cur_slow && prev_fast > prev_slow;
        let downtrend = cur_fast < cur_slow && prev_fast < prev_slow;
        if uptrend
            && price_above
            && close > prev_close
            && volume_ok
            && (cur_fast - cur_slow) > (prev_fast - prev_slow)
        {
            debug!("EmaCrossover: uptrend continuation");
            return Signal::Buy;
        }
        if downtrend
            && price_below
            && close < prev_close
            && volume_ok
            && (cur_slow - cur_fast) > (prev_slow - prev_fast)
        {
            debug!("EmaCrossover: downtrend continuation");
            return Signal::Sell;
        }

        Signal::Hold
    }

    fn name(&self) -> &str {
        "EmaCrossover"
    }
}
