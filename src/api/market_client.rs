//! KuCoin public market data client (no authentication).

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{classify_body, decode_data, AllTickers, ExchangeResult, Ticker};

/// KuCoin REST base URL.
pub const KUCOIN_URL: &str = "https://api.kucoin.com";

/// Symbols watched when the caller names none.
pub const DEFAULT_SYMBOLS: [&str; 5] = ["BTC-USDT", "ETH-USDT", "ADA-USDT", "SOL-USDT", "MATIC-USDT"];

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Turn a sent request into an exchange result. Never retries.
pub(crate) async fn read_response(sent: reqwest::Result<Response>) -> ExchangeResult<Value> {
    let response = match sent {
        Ok(r) => r,
        Err(e) => {
            return ExchangeResult::TransportError {
                message: format!("Request failed: {}", e),
            }
        }
    };

    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => classify_body(status, &body),
        Err(e) => ExchangeResult::TransportError {
            message: format!("Failed to read response body (HTTP {}): {}", status, e),
        },
    }
}

/// Last prices for a set of symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketSnapshot {
    /// Requested symbols that the exchange returned, in exchange order
    pub symbols: Vec<String>,
    pub prices: BTreeMap<String, Decimal>,
}

/// Client for public market endpoints.
#[derive(Clone)]
pub struct MarketClient {
    client: Client,
    base_url: String,
}

impl MarketClient {
    /// Create a new market client against the production API.
    pub fn new() -> Result<Self> {
        Self::with_base_url(KUCOIN_URL.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        Ok(Self::with_client(build_http_client()?, base_url))
    }

    pub(crate) fn with_client(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch every ticker on the exchange.
    pub async fn get_all_tickers(&self) -> ExchangeResult<Vec<Ticker>> {
        let url = format!("{}/api/v1/market/allTickers", self.base_url);
        debug!(url = %url, "Fetching all tickers");

        let sent = self.client.get(&url).send().await;
        read_response(sent)
            .await
            .and_then(decode_data::<AllTickers>)
            .map(|all| all.ticker)
    }

    /// Last price per requested symbol.
    ///
    /// Tickers without a usable `last` price are left out of the snapshot.
    pub async fn get_market_data(&self, symbols: &[String]) -> ExchangeResult<MarketSnapshot> {
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();

        self.get_all_tickers().await.map(|tickers| {
            let mut snapshot = MarketSnapshot::default();
            for ticker in tickers.iter().filter(|t| wanted.contains(t.symbol.as_str())) {
                snapshot.symbols.push(ticker.symbol.clone());
                match ticker.last_price() {
                    Some(price) => {
                        snapshot.prices.insert(ticker.symbol.clone(), price);
                    }
                    None => warn!(symbol = %ticker.symbol, "Ticker has no last price"),
                }
            }
            snapshot
        })
    }

    /// Last price for one symbol, if the exchange lists it.
    pub async fn get_last_price(&self, symbol: &str) -> ExchangeResult<Option<Decimal>> {
        self.get_market_data(&[symbol.to_string()])
            .await
            .map(|snapshot| snapshot.prices.get(symbol).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn tickers_body() -> Value {
        json!({
            "code": "200000",
            "data": {
                "time": 1700000000000i64,
                "ticker": [
                    {"symbol": "BTC-USDT", "symbolName": "BTC-USDT", "last": "67000.5"},
                    {"symbol": "DOGE-USDT", "symbolName": "DOGE-USDT", "last": "0.12"},
                    {"symbol": "ETH-USDT", "symbolName": "ETH-USDT", "last": "3500.25"},
                    {"symbol": "ADA-USDT", "symbolName": "ADA-USDT", "last": null}
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_market_data_filters_symbols() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/market/allTickers");
                then.status(200).json_body(tickers_body());
            })
            .await;

        let client = MarketClient::with_base_url(server.base_url()).unwrap();
        let symbols: Vec<String> = DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();
        let snapshot = client.get_market_data(&symbols).await.success().unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.symbols, vec!["BTC-USDT", "ETH-USDT", "ADA-USDT"]);
        assert_eq!(snapshot.prices.get("BTC-USDT"), Some(&dec!(67000.5)));
        assert_eq!(snapshot.prices.get("ETH-USDT"), Some(&dec!(3500.25)));
        assert!(!snapshot.prices.contains_key("ADA-USDT"));
        assert!(!snapshot.prices.contains_key("DOGE-USDT"));
    }

    #[tokio::test]
    async fn test_last_price() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/market/allTickers");
                then.status(200).json_body(tickers_body());
            })
            .await;

        let client = MarketClient::with_base_url(server.base_url()).unwrap();
        assert_eq!(
            client.get_last_price("DOGE-USDT").await,
            ExchangeResult::Success(Some(dec!(0.12)))
        );
        assert_eq!(client.get_last_price("XRP-USDT").await, ExchangeResult::Success(None));
    }

    #[tokio::test]
    async fn test_market_data_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/market/allTickers");
                then.status(429)
                    .json_body(json!({"code": "429000", "msg": "Too Many Requests"}));
            })
            .await;

        let client = MarketClient::with_base_url(server.base_url()).unwrap();
        let result = client.get_market_data(&["BTC-USDT".to_string()]).await;
        assert_eq!(
            result,
            ExchangeResult::Rejected {
                code: Some("429000".to_string()),
                message: "Too Many Requests".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is not served in test environments.
        let client = MarketClient::with_base_url("http://127.0.0.1:9".to_string()).unwrap();
        let result = client.get_all_tickers().await;
        assert!(matches!(result, ExchangeResult::TransportError { .. }));
    }
}
