use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::common::{ApiEnvelope, TokenResponse};
use super::UpstoxClient;
use crate::config::UpstoxEnvConfig;
use crate::domain::errors::AuthError;
use crate::domain::ports::Authenticator;
use crate::domain::trading::types::BrokerSession;

/// Authenticates against Upstox, either with a pre-issued access token or
/// by exchanging an authorization code from the login redirect.
pub struct UpstoxAuthenticator {
    client: Arc<UpstoxClient>,
    config: UpstoxEnvConfig,
}

impl UpstoxAuthenticator {
    pub fn new(client: Arc<UpstoxClient>, config: UpstoxEnvConfig) -> Self {
        Self { client, config }
    }

    /// The login dialog URL an operator must visit to obtain an
    /// authorization code when no token is configured.
    pub fn authorization_url(&self) -> String {
        Url::parse_with_params(
            "https://api.upstox.com/v2/login/authorization/dialog",
            &[
                ("response_type", "code"),
                ("client_id", self.config.api_key.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .map(|url| url.to_string())
        .unwrap_or_default()
    }

    async fn exchange_code(&self, code: &str) -> Result<BrokerSession, AuthError> {
        let url = format!("{}/login/authorization/token", self.client.base_url);
        let params = [
            ("code", code),
            ("client_id", self.config.api_key.as_str()),
            ("client_secret", self.config.api_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .client
            .http
            .post(&url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Exchange {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected {
                reason: format!("token endpoint returned {}", response.status()),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| AuthError::Exchange {
            reason: format!("failed to decode token response: {}", e),
        })?;

        Ok(BrokerSession {
            access_token: token.access_token,
            user_id: token.user_id,
            user_name: token.user_name,
            broker: token.broker,
            is_active: token.is_active,
        })
    }

    async fn verify_token(&self, access_token: &str) -> Result<BrokerSession, AuthError> {
        let url = format!("{}/user/profile", self.client.base_url);
        let response = self
            .client
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::Exchange {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected {
                reason: format!("profile endpoint returned {}", response.status()),
            });
        }

        #[derive(serde::Deserialize)]
        struct Profile {
            #[serde(default)]
            user_id: String,
            #[serde(default)]
            user_name: String,
            #[serde(default)]
            broker: String,
            #[serde(default)]
            is_active: bool,
        }

        let envelope: ApiEnvelope<Profile> =
            response.json().await.map_err(|e| AuthError::Exchange {
                reason: format!("failed to decode profile: {}", e),
            })?;
        let profile = envelope.data.ok_or(AuthError::Rejected {
            reason: "profile response carried no data".to_string(),
        })?;

        Ok(BrokerSession {
            access_token: access_token.to_string(),
            user_id: profile.user_id,
            user_name: profile.user_name,
            broker: profile.broker,
            is_active: profile.is_active,
        })
    }
}

#[async_trait]
impl Authenticator for UpstoxAuthenticator {
    async fn authenticate(&self) -> Result<BrokerSession, AuthError> {
        let session = if let Some(token) = &self.config.access_token {
            self.verify_token(token).await?
        } else if let Some(code) = &self.config.auth_code {
            self.exchange_code(code).await?
        } else {
            info!(
                "UpstoxAuthenticator: No credentials configured. Visit {} to authorize",
                self.authorization_url()
            );
            return Err(AuthError::MissingCredentials);
        };

        self.client.set_token(&session.access_token).await;
        info!(
            "UpstoxAuthenticator: Session established for {} ({})",
            session.user_id, session.broker
        );
        Ok(session)
    }
}
