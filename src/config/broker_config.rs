//! Upstox broker credentials and endpoints.

use std::env;

use crate::domain::errors::ConfigError;

const DEFAULT_BASE_URL: &str = "https://api.upstox.com/v2";

#[derive(Debug, Clone)]
pub struct UpstoxEnvConfig {
    pub api_key: String,
    pub api_secret: String,
    pub redirect_uri: String,
    /// Pre-issued access token; skips the authorization-code exchange.
    pub access_token: Option<String>,
    /// Authorization code from the login redirect, exchanged at startup.
    pub auth_code: Option<String>,
    pub base_url: String,
}

impl UpstoxEnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let require = |key: &str| -> Result<String, ConfigError> {
            let value = env::var(key).map_err(|_| ConfigError::MissingVar {
                key: key.to_string(),
            })?;
            if value.trim().is_empty() {
                return Err(ConfigError::MissingVar {
                    key: key.to_string(),
                });
            }
            Ok(value)
        };

        Ok(Self {
            api_key: require("UPSTOX_API_KEY")?,
            api_secret: require("UPSTOX_API_SECRET")?,
            redirect_uri: require("UPSTOX_REDIRECT_URI")?,
            access_token: env::var("UPSTOX_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
            auth_code: env::var("UPSTOX_AUTH_CODE").ok().filter(|c| !c.is_empty()),
            base_url: env::var("UPSTOX_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        })
    }
}
