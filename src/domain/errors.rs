use thiserror::Error;

/// Fatal configuration problems. A session with an invalid configuration
/// never starts; there is no defaulting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}")]
    MissingVar { key: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Risk limit {name} must be strictly positive, got {value}")]
    NonPositiveLimit { name: String, value: String },
}

/// Authentication failures. Fatal once the bounded retry budget is spent.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Broker rejected authentication: {reason}")]
    Rejected { reason: String },

    #[error("Token exchange failed: {reason}")]
    Exchange { reason: String },

    #[error("No access token or authorization code configured")]
    MissingCredentials,
}

/// Market data failures. Transient during RUNNING; persistent failures
/// with an open position escalate to a protective flatten.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Market data unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("No data returned for {instrument_key}")]
    Empty { instrument_key: String },

    #[error("Failed to decode market data: {reason}")]
    Decode { reason: String },

    #[error("Invalid market data request: {reason}")]
    InvalidRequest { reason: String },
}

/// Order placement failures. Transient during RUNNING; during FLATTENING
/// they drive the bounded close-order retry policy.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order rejected by broker: {reason}")]
    Rejected { reason: String },

    #[error("Order transport failure: {reason}")]
    Transport { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_formatting() {
        let err = ConfigError::NonPositiveLimit {
            name: "stop_loss_amount".to_string(),
            value: "-100".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stop_loss_amount"));
        assert!(msg.contains("-100"));
    }

    #[test]
    fn test_data_error_formatting() {
        let err = DataError::Empty {
            instrument_key: "NSE_INDEX|Nifty Bank".to_string(),
        };
        assert!(err.to_string().contains("Nifty Bank"));
    }
}
