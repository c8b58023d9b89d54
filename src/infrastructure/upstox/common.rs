use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::errors::DataError;
use crate::domain::trading::types::Candle;
use crate::infrastructure::http::build_url_with_query;
use crate::infrastructure::upstox::UpstoxClient;

/// Standard Upstox response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub status: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandlePayload {
    /// Rows of `[timestamp, open, high, low, close, volume, open_interest]`.
    pub candles: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LtpQuote {
    pub last_price: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub broker: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderIds {
    pub order_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContractRow {
    pub instrument_key: String,
    pub strike_price: f64,
    /// "CE" or "PE"
    pub instrument_type: String,
    pub expiry: NaiveDate,
}

pub(crate) fn decode_candle_row(row: &[Value]) -> Result<Candle, DataError> {
    if row.len() < 6 {
        return Err(DataError::Decode {
            reason: format!("candle row has {} fields, expected at least 6", row.len()),
        });
    }
    let timestamp = row[0]
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DataError::Decode {
            reason: format!("unparseable candle timestamp {}", row[0]),
        })?;

    let number = |value: &Value, field: &str| -> Result<Decimal, DataError> {
        value
            .as_f64()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| DataError::Decode {
                reason: format!("non-numeric candle {} field {}", field, value),
            })
    };

    Ok(Candle {
        open: number(&row[1], "open")?,
        high: number(&row[2], "high")?,
        low: number(&row[3], "low")?,
        close: number(&row[4], "close")?,
        volume: number(&row[5], "volume")?,
        timestamp,
    })
}

/// Latest traded price, shared between market data (tick pricing) and
/// execution (fill price confirmation after a market order).
pub(crate) async fn fetch_ltp(
    client: &Arc<UpstoxClient>,
    instrument_key: &str,
) -> Result<Decimal, DataError> {
    let token = client.token().await.ok_or_else(|| DataError::Unavailable {
        reason: "no access token".to_string(),
    })?;

    let url = build_url_with_query(
        &format!("{}/market-quote/ltp", client.base_url),
        &[("instrument_key", instrument_key)],
    );

    let response = client
        .http
        .get(&url)
        .bearer_auth(&token)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| DataError::Unavailable {
            reason: e.to_string(),
        })?;

    let envelope: ApiEnvelope<std::collections::HashMap<String, LtpQuote>> = response
        .json()
        .await
        .map_err(|e| DataError::Decode {
            reason: e.to_string(),
        })?;

    let data = match envelope {
        ApiEnvelope {
            status,
            data: Some(data),
        } if status == "success" => data,
        _ => {
            return Err(DataError::Empty {
                instrument_key: instrument_key.to_string(),
            });
        }
    };

    // The quote map is keyed by a broker-normalized symbol; with a single
    // instrument requested the first entry is the one.
    data.values()
        .next()
        .and_then(|quote| Decimal::from_f64(quote.last_price))
        .ok_or_else(|| DataError::Empty {
            instrument_key: instrument_key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_candle_row() {
        let row = vec![
            json!("2025-08-15T09:15:00+05:30"),
            json!(100.0),
            json!(101.0),
            json!(99.5),
            json!(100.5),
            json!(1200.0),
            json!(0),
        ];
        let candle = decode_candle_row(&row).expect("decodable row");
        assert_eq!(candle.close, Decimal::from_f64(100.5).expect("decimal"));
        assert_eq!(candle.volume, Decimal::from(1200));
    }

    #[test]
    fn test_short_candle_row_rejected() {
        let row = vec![json!("2025-08-15T09:15:00+05:30"), json!(100.0)];
        assert!(decode_candle_row(&row).is_err());
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let row = vec![
            json!("yesterday"),
            json!(100.0),
            json!(101.0),
            json!(99.5),
            json!(100.5),
            json!(1200.0),
        ];
        assert!(decode_candle_row(&row).is_err());
    }
}
