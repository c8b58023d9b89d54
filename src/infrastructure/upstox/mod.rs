//! Upstox REST adapters.
//!
//! A shared client holds the retry-capable HTTP stack and the session
//! token; the authenticator writes the token, market data and execution
//! read it per request.

mod auth;
mod common;
mod execution;
mod market_data;

pub use auth::UpstoxAuthenticator;
pub use execution::UpstoxExecutionGateway;
pub use market_data::UpstoxMarketData;

use reqwest_middleware::ClientWithMiddleware;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::infrastructure::http::HttpClientFactory;

pub struct UpstoxClient {
    pub(crate) http: ClientWithMiddleware,
    pub(crate) base_url: String,
    token: RwLock<Option<String>>,
}

impl UpstoxClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: HttpClientFactory::create_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub async fn set_token(&self, token: &str) {
        *self.token.write().await = Some(token.to_string());
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}
