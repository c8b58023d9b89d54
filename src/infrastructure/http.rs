use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

/// Builds HTTP clients with transient-retry middleware. All broker calls
/// go through one of these, so every request carries a bounded timeout and
/// the retry/backoff policy lives at the collaborator boundary, not in the
/// trading logic.
pub struct HttpClientFactory;

impl HttpClientFactory {
    pub fn create_client(timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// Builds a URL with query parameters. reqwest-middleware does not expose
/// `.query()`, so the query string is assembled manually. Instrument keys
/// contain `|` and spaces and must be percent-encoded.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return base_url.to_string();
    }

    let query: String = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k.as_ref()), percent_encode(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base_url, separator, query)
}

/// Percent-encode a single query component.
pub fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => encoded.push(c),
            _ => {
                for byte in c.to_string().as_bytes() {
                    encoded.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_key_is_encoded() {
        let url = build_url_with_query(
            "https://api.upstox.com/v2/market-quote/ltp",
            &[("instrument_key", "NSE_INDEX|Nifty Bank")],
        );
        assert_eq!(
            url,
            "https://api.upstox.com/v2/market-quote/ltp?instrument_key=NSE_INDEX%7CNifty%20Bank"
        );
    }

    #[test]
    fn test_no_params_returns_base() {
        let url = build_url_with_query::<&str, &str>("https://api.upstox.com/v2/user", &[]);
        assert_eq!(url, "https://api.upstox.com/v2/user");
    }
}
