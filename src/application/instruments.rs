//! Instrument resolution.
//!
//! Maps an entry signal to the instrument actually traded. Direct mode
//! trades the configured key on both sides; option mode buys the
//! at-the-money weekly call or put on the underlying.

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::application::clock::Clock;
use crate::domain::errors::DataError;
use crate::domain::ports::{InstrumentResolver, MarketDataService, ResolvedEntry};
use crate::domain::trading::types::{OptionContract, OptionType, OrderSide, Signal};

/// Next weekly (Thursday) expiry on or after the given date.
pub fn weekly_expiry(from: NaiveDate) -> NaiveDate {
    let days_ahead =
        (Weekday::Thu.num_days_from_monday() + 7 - from.weekday().num_days_from_monday()) % 7;
    from.checked_add_days(Days::new(days_ahead as u64))
        .unwrap_or(from)
}

/// Round a price to the nearest strike step.
pub fn atm_strike(price: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return price;
    }
    (price / step).round() * step
}

/// Pick the contract at the ATM strike, falling back to the nearest
/// available strike of the requested type.
pub fn select_atm_contract<'a>(
    contracts: &'a [OptionContract],
    option_type: OptionType,
    underlying_price: Decimal,
    step: Decimal,
) -> Option<&'a OptionContract> {
    let target = atm_strike(underlying_price, step);
    let candidates: Vec<&OptionContract> = contracts
        .iter()
        .filter(|c| c.option_type == option_type)
        .collect();

    if let Some(exact) = candidates.iter().find(|c| c.strike == target) {
        return Some(exact);
    }
    candidates
        .into_iter()
        .min_by_key(|c| (c.strike - target).abs())
}

/// Trades the configured instrument directly: a SELL signal opens a short.
pub struct FixedInstrumentResolver {
    instrument_key: String,
}

impl FixedInstrumentResolver {
    pub fn new(instrument_key: &str) -> Self {
        Self {
            instrument_key: instrument_key.to_string(),
        }
    }
}

#[async_trait]
impl InstrumentResolver for FixedInstrumentResolver {
    async fn resolve(
        &self,
        signal: Signal,
        _underlying_price: Decimal,
    ) -> Result<ResolvedEntry, DataError> {
        let side = match signal {
            Signal::Buy => OrderSide::Buy,
            Signal::Sell => OrderSide::Sell,
            Signal::Hold => {
                return Err(DataError::InvalidRequest {
                    reason: "HOLD signal cannot be resolved to an entry".to_string(),
                });
            }
        };
        Ok(ResolvedEntry {
            instrument_key: self.instrument_key.clone(),
            side,
        })
    }
}

/// Buys the ATM weekly option on the underlying: calls on BUY signals,
/// puts on SELL signals. The order side is always BUY; direction exposure
/// comes from the option type.
pub struct AtmOptionResolver {
    market_data: Arc<dyn MarketDataService>,
    underlying_key: String,
    strike_step: Decimal,
    clock: Arc<dyn Clock>,
}

impl AtmOptionResolver {
    pub fn new(
        market_data: Arc<dyn MarketDataService>,
        underlying_key: &str,
        strike_step: Decimal,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            market_data,
            underlying_key: underlying_key.to_string(),
            strike_step,
            clock,
        }
    }
}

#[async_trait]
impl InstrumentResolver for AtmOptionResolver {
    async fn resolve(
        &self,
        signal: Signal,
        underlying_price: Decimal,
    ) -> Result<ResolvedEntry, DataError> {
        let option_type = match signal {
            Signal::Buy => OptionType::Call,
            Signal::Sell => OptionType::Put,
            Signal::Hold => {
                return Err(DataError::InvalidRequest {
                    reason: "HOLD signal cannot be resolved to an entry".to_string(),
                });
            }
        };

        let expiry = weekly_expiry(self.clock.now().date_naive());
        let contracts = self
            .market_data
            .option_contracts(&self.underlying_key, expiry)
            .await?;

        let contract =
            select_atm_contract(&contracts, option_type, underlying_price, self.strike_step)
                .ok_or_else(|| DataError::Empty {
                    instrument_key: self.underlying_key.clone(),
                })?;

        debug!(
            "AtmOptionResolver: {} {} @ strike {} (underlying {})",
            option_type, contract.instrument_key, contract.strike, underlying_price
        );
        Ok(ResolvedEntry {
            instrument_key: contract.instrument_key.clone(),
            side: OrderSide::Buy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn contract(key: &str, strike: Decimal, option_type: OptionType) -> OptionContract {
        OptionContract {
            instrument_key: key.to_string(),
            strike,
            option_type,
            expiry: weekly_expiry(NaiveDate::from_ymd_opt(2025, 8, 15).expect("valid date")),
        }
    }

    #[test]
    fn test_weekly_expiry_lands_on_thursday_within_a_week() {
        let from = NaiveDate::from_ymd_opt(2025, 8, 15).expect("valid date");
        let expiry = weekly_expiry(from);
        assert_eq!(expiry.weekday(), Weekday::Thu);
        assert!(expiry >= from);
        assert!((expiry - from).num_days() < 7);
    }

    #[test]
    fn test_weekly_expiry_on_thursday_is_identity() {
        let thursday = NaiveDate::from_ymd_opt(2025, 8, 21).expect("valid date");
        assert_eq!(thursday.weekday(), Weekday::Thu);
        assert_eq!(weekly_expiry(thursday), thursday);
    }

    #[test]
    fn test_atm_strike_rounds_to_step() {
        assert_eq!(atm_strike(dec!(47213), dec!(50)), dec!(47200));
        assert_eq!(atm_strike(dec!(47230), dec!(50)), dec!(47250));
    }

    #[test]
    fn test_select_exact_atm_contract() {
        let contracts = vec![
            contract("CE-47200", dec!(47200), OptionType::Call),
            contract("CE-47250", dec!(47250), OptionType::Call),
            contract("PE-47200", dec!(47200), OptionType::Put),
        ];
        let selected =
            select_atm_contract(&contracts, OptionType::Call, dec!(47213), dec!(50))
                .expect("contract available");
        assert_eq!(selected.instrument_key, "CE-47200");
    }

    #[test]
    fn test_select_falls_back_to_nearest_strike() {
        let contracts = vec![
            contract("CE-47300", dec!(47300), OptionType::Call),
            contract("CE-47500", dec!(47500), OptionType::Call),
        ];
        let selected =
            select_atm_contract(&contracts, OptionType::Call, dec!(47213), dec!(50))
                .expect("contract available");
        assert_eq!(selected.instrument_key, "CE-47300");
    }

    #[test]
    fn test_select_respects_option_type() {
        let contracts = vec![contract("CE-47200", dec!(47200), OptionType::Call)];
        assert!(select_atm_contract(&contracts, OptionType::Put, dec!(47200), dec!(50)).is_none());
    }

    #[tokio::test]
    async fn test_fixed_resolver_maps_sell_to_short_entry() {
        let resolver = FixedInstrumentResolver::new("NSE_INDEX|Nifty Bank");
        let entry = resolver
            .resolve(Signal::Sell, dec!(47200))
            .await
            .expect("resolvable");
        assert_eq!(entry.instrument_key, "NSE_INDEX|Nifty Bank");
        assert_eq!(entry.side, OrderSide::Sell);
    }

    #[tokio::test]
    async fn test_fixed_resolver_rejects_hold() {
        let resolver = FixedInstrumentResolver::new("NSE_INDEX|Nifty Bank");
        assert!(resolver.resolve(Signal::Hold, dec!(47200)).await.is_err());
    }
}
