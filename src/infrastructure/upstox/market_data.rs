use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::Arc;
use tracing::debug;

use super::common::{self, ApiEnvelope, CandlePayload, ContractRow};
use super::UpstoxClient;
use crate::domain::errors::DataError;
use crate::domain::ports::MarketDataService;
use crate::domain::trading::types::{Candle, OptionContract, OptionType};
use crate::infrastructure::http::{build_url_with_query, percent_encode};

pub struct UpstoxMarketData {
    client: Arc<UpstoxClient>,
}

impl UpstoxMarketData {
    pub fn new(client: Arc<UpstoxClient>) -> Self {
        Self { client }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DataError> {
        let token = self
            .client
            .token()
            .await
            .ok_or_else(|| DataError::Unavailable {
                reason: "no access token".to_string(),
            })?;

        let response = self
            .client
            .http
            .get(url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DataError::Unavailable {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DataError::Unavailable {
                reason: format!("broker returned {}", response.status()),
            });
        }

        response.json::<T>().await.map_err(|e| DataError::Decode {
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MarketDataService for UpstoxMarketData {
    async fn latest_price(&self, instrument_key: &str) -> Result<Decimal, DataError> {
        common::fetch_ltp(&self.client, instrument_key).await
    }

    async fn intraday_candles(
        &self,
        instrument_key: &str,
        unit: &str,
        interval: u32,
    ) -> Result<Vec<Candle>, DataError> {
        let url = format!(
            "{}/historical-candle/intraday/{}/{}/{}",
            self.client.base_url,
            percent_encode(instrument_key),
            unit,
            interval
        );

        let envelope: ApiEnvelope<CandlePayload> = self.get_json(&url).await?;
        let payload = match envelope {
            ApiEnvelope {
                status,
                data: Some(payload),
            } if status == "success" => payload,
            _ => {
                return Err(DataError::Empty {
                    instrument_key: instrument_key.to_string(),
                });
            }
        };

        let mut candles = payload
            .candles
            .iter()
            .map(|row| common::decode_candle_row(row))
            .collect::<Result<Vec<Candle>, DataError>>()?;

        // The broker reports newest first; the strategy expects oldest first.
        candles.sort_by_key(|c| c.timestamp);
        debug!(
            "UpstoxMarketData: {} candles for {} ({} {})",
            candles.len(),
            instrument_key,
            interval,
            unit
        );
        Ok(candles)
    }

    async fn option_contracts(
        &self,
        underlying_key: &str,
        expiry: NaiveDate,
    ) -> Result<Vec<OptionContract>, DataError> {
        let expiry_str = expiry.format("%Y-%m-%d").to_string();
        let url = build_url_with_query(
            &format!("{}/option/contract", self.client.base_url),
            &[
                ("instrument_key", underlying_key),
                ("expiry_date", expiry_str.as_str()),
            ],
        );

        let envelope: ApiEnvelope<Vec<ContractRow>> = self.get_json(&url).await?;
        let rows = match envelope {
            ApiEnvelope {
                status,
                data: Some(rows),
            } if status == "success" => rows,
            _ => {
                return Err(DataError::Empty {
                    instrument_key: underlying_key.to_string(),
                });
            }
        };

        let contracts = rows
            .into_iter()
            .filter_map(|row| {
                let option_type = match row.instrument_type.as_str() {
                    "CE" => OptionType::Call,
                    "PE" => OptionType::Put,
                    _ => return None,
                };
                Some(OptionContract {
                    instrument_key: row.instrument_key,
                    strike: Decimal::from_f64(row.strike_price)?,
                    option_type,
                    expiry: row.expiry,
                })
            })
            .collect();
        Ok(contracts)
    }
}
