//! Authenticated KuCoin REST client for account and order endpoints.
//!
//! Every request is signed at send time with a fresh millisecond timestamp.
//! Nothing here retries: a `TransportError` on order placement means the
//! order may or may not exist, and the caller decides how to reconcile.

use anyhow::Result;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::ValidationError;
use super::market_client::{build_http_client, read_response, MarketClient, MarketSnapshot, KUCOIN_URL};
use super::order_builder::OrderPayload;
use super::signer::{Credentials, SignedRequest};
use super::types::{
    decode_data, decode_placed_order, AccountBalance, ExchangeResult, OrderDetails, OrderResult,
};

pub const ORDERS_PATH: &str = "/api/v1/orders";
pub const ACCOUNTS_PATH: &str = "/api/v1/accounts";

/// KuCoin client holding process-wide credentials.
#[derive(Clone)]
pub struct KucoinClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    market: MarketClient,
}

impl KucoinClient {
    /// Create a new client against the production API.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, KUCOIN_URL.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Result<Self> {
        let http = build_http_client()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            market: MarketClient::with_client(http.clone(), base_url.clone()),
            http,
            base_url,
            credentials,
        })
    }

    /// Create from KUCOIN_* environment variables (see [`Credentials::from_env`]).
    ///
    /// KUCOIN_BASE_URL overrides the API host.
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials::from_env()?;
        let base_url = std::env::var("KUCOIN_BASE_URL").unwrap_or_else(|_| KUCOIN_URL.to_string());
        Self::with_base_url(credentials, base_url)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn market(&self) -> &MarketClient {
        &self.market
    }

    /// Sign a request for the given timestamp.
    pub fn sign(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> SignedRequest {
        self.credentials
            .sign_request(timestamp, method.as_str(), path, body)
    }

    /// Attach KC-API-* headers. Credential values are checked as header
    /// values in [`Credentials::new`].
    fn authenticate(&self, request: RequestBuilder, signed: &SignedRequest) -> RequestBuilder {
        request
            .header("kc-api-key", self.credentials.api_key())
            .header("kc-api-sign", signed.signature.as_str())
            .header("kc-api-timestamp", signed.timestamp.as_str())
            .header("kc-api-passphrase", signed.passphrase.as_str())
            .header("kc-api-key-version", self.credentials.key_version().as_str())
            .header(CONTENT_TYPE, "application/json")
    }

    /// Sign and send one request; `path` includes any query string.
    pub async fn send(&self, method: Method, path: &str, body: &str) -> ExchangeResult<Value> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signed = self.sign(&timestamp, &method, path, body);
        debug!(request = ?signed, "Sending signed request");

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.authenticate(self.http.request(method, &url), &signed);
        if !body.is_empty() {
            request = request.body(signed.body.clone());
        }

        read_response(request.send().await).await
    }

    /// Place an order built by [`OrderPayload::build`].
    pub async fn place_order(&self, payload: &OrderPayload) -> OrderResult {
        let body = payload.to_body();
        info!(
            client_oid = %payload.client_oid,
            symbol = %payload.symbol,
            side = payload.side.as_str(),
            amount = payload.amount().unwrap_or_default(),
            "Placing KuCoin order"
        );

        let result = self
            .send(Method::POST, ORDERS_PATH, &body)
            .await
            .and_then(decode_placed_order);

        match &result {
            ExchangeResult::Success(placed) => {
                info!(order_id = %placed.order_id, client_oid = %payload.client_oid, "Order placed")
            }
            ExchangeResult::Rejected { code, message } => {
                warn!(code = ?code, message = %message, client_oid = %payload.client_oid, "Order rejected")
            }
            ExchangeResult::TransportError { message } => {
                warn!(message = %message, client_oid = %payload.client_oid, "Order outcome unknown")
            }
        }
        result
    }

    /// Get order status by exchange order id.
    pub async fn get_order(
        &self,
        order_id: &str,
    ) -> Result<ExchangeResult<OrderDetails>, ValidationError> {
        let path = format!("{}/{}", ORDERS_PATH, path_id(order_id)?);
        Ok(self.send(Method::GET, &path, "").await.and_then(decode_data))
    }

    /// Get order status by the clientOid it was submitted with.
    pub async fn get_order_by_client_oid(
        &self,
        client_oid: &str,
    ) -> Result<ExchangeResult<OrderDetails>, ValidationError> {
        let path = format!("/api/v1/order/client-order/{}", path_id(client_oid)?);
        Ok(self.send(Method::GET, &path, "").await.and_then(decode_data))
    }

    /// List account balances.
    pub async fn get_accounts(&self) -> ExchangeResult<Vec<AccountBalance>> {
        self.send(Method::GET, ACCOUNTS_PATH, "").await.and_then(decode_data)
    }

    /// Last prices for the given symbols (public endpoint).
    pub async fn get_market_data(&self, symbols: &[String]) -> ExchangeResult<MarketSnapshot> {
        self.market.get_market_data(symbols).await
    }
}

/// Ids are interpolated into the signed path, which must reach the server
/// byte for byte.
fn path_id(id: &str) -> Result<&str, ValidationError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(ValidationError::InvalidOrderId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::order_builder::{OrderRequest, OrderSide};
    use crate::api::signer::{encode_passphrase, KeyVersion};
    use crate::api::types::PlacedOrder;
    use httpmock::prelude::*;
    use reqwest::Method;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn credentials(version: KeyVersion) -> Credentials {
        Credentials::new("test-key", "test-secret", "test-pass", version).unwrap()
    }

    fn client(server: &MockServer, version: KeyVersion) -> KucoinClient {
        KucoinClient::with_base_url(credentials(version), server.base_url()).unwrap()
    }

    #[tokio::test]
    async fn test_place_order_success() {
        let server = MockServer::start_async().await;
        let passphrase = encode_passphrase("test-pass", "test-secret", KeyVersion::V2);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/orders")
                    .header("KC-API-KEY", "test-key")
                    .header("KC-API-KEY-VERSION", "2")
                    .header("KC-API-PASSPHRASE", passphrase.as_str())
                    .header_exists("KC-API-SIGN")
                    .header_exists("KC-API-TIMESTAMP")
                    .body_includes(r#""funds":"25""#);
                then.status(200)
                    .json_body(json!({"code": "200000", "data": {"orderId": "672a249054d62a0007ae04b8"}}));
            })
            .await;

        let payload = OrderPayload::build(&OrderRequest::market("BTC-USDT", OrderSide::Buy, dec!(25))).unwrap();
        let result = client(&server, KeyVersion::V2).place_order(&payload).await;

        mock.assert_async().await;
        assert_eq!(
            result,
            ExchangeResult::Success(PlacedOrder {
                order_id: "672a249054d62a0007ae04b8".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_raw_passphrase_for_version_one() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/accounts")
                    .header("KC-API-PASSPHRASE", "test-pass")
                    .header("KC-API-KEY-VERSION", "1");
                then.status(200).json_body(json!({"code": "200000", "data": []}));
            })
            .await;

        let result = client(&server, KeyVersion::V1).get_accounts().await;
        mock.assert_async().await;
        assert_eq!(result.success().map(|a| a.len()), Some(0));
    }

    #[tokio::test]
    async fn test_success_without_order_id_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/orders");
                then.status(200).json_body(json!({"code": "200000", "data": {}}));
            })
            .await;

        let payload = OrderPayload::build(&OrderRequest::market("BTC-USDT", OrderSide::Sell, dec!(0.5))).unwrap();
        let result = client(&server, KeyVersion::V2).place_order(&payload).await;

        assert_eq!(
            result,
            ExchangeResult::Rejected {
                code: Some("200000".to_string()),
                message: "malformed success response: missing orderId".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_exchange_rejection_is_verbatim() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/orders");
                then.status(400)
                    .json_body(json!({"code": "400100", "msg": "Order funds invalid."}));
            })
            .await;

        let payload = OrderPayload::build(&OrderRequest::market("BTC-USDT", OrderSide::Buy, dec!(0.01))).unwrap();
        let result = client(&server, KeyVersion::V2).place_order(&payload).await;

        assert_eq!(
            result,
            ExchangeResult::Rejected {
                code: Some("400100".to_string()),
                message: "Order funds invalid.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_non_json_is_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/orders");
                then.status(502).body("<html>bad gateway</html>");
            })
            .await;

        let payload = OrderPayload::build(&OrderRequest::market("BTC-USDT", OrderSide::Buy, dec!(10))).unwrap();
        let result = client(&server, KeyVersion::V2).place_order(&payload).await;
        assert!(matches!(result, ExchangeResult::TransportError { .. }));
    }

    #[tokio::test]
    async fn test_get_order_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/orders/672a249054d62a0007ae04b8");
                then.status(200).json_body(json!({
                    "code": "200000",
                    "data": {
                        "id": "672a249054d62a0007ae04b8",
                        "symbol": "BTC-USDT",
                        "type": "market",
                        "side": "buy",
                        "funds": "25",
                        "dealFunds": "24.99",
                        "dealSize": "0.00037",
                        "isActive": false,
                        "cancelExist": false,
                        "clientOid": "5c52e11203aa677f33e493fb",
                        "createdAt": 1730814096000i64
                    }
                }));
            })
            .await;

        let details = client(&server, KeyVersion::V2)
            .get_order("672a249054d62a0007ae04b8")
            .await
            .unwrap()
            .success()
            .unwrap();
        assert_eq!(details.symbol, "BTC-USDT");
        assert_eq!(details.deal_size.as_deref(), Some("0.00037"));
        assert_eq!(details.status_label(), "done");
    }

    #[tokio::test]
    async fn test_get_order_by_client_oid() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/order/client-order/abc-123");
                then.status(404)
                    .json_body(json!({"code": "400100", "msg": "order not exist."}));
            })
            .await;

        let result = client(&server, KeyVersion::V2)
            .get_order_by_client_oid("abc-123")
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(matches!(result, ExchangeResult::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_order_ids_cannot_leave_the_order_path() {
        let server = MockServer::start_async().await;
        let client = client(&server, KeyVersion::V2);
        assert_eq!(
            client.get_order("../accounts").await.unwrap_err(),
            ValidationError::InvalidOrderId("../accounts".to_string())
        );
        assert!(client.get_order_by_client_oid("a/b").await.is_err());
        assert!(client.get_order_by_client_oid("").await.is_err());
        assert!(client.get_order("abc?x=1").await.is_err());
    }

    #[test]
    fn test_sign_uses_uppercase_method_and_exact_body() {
        let creds = credentials(KeyVersion::V2);
        let client = KucoinClient::with_base_url(creds, "http://localhost".to_string()).unwrap();
        let signed = client.sign("1700000000000", &Method::POST, "/api/v1/orders", "{}");
        assert_eq!(
            signed.signature,
            crate::api::signer::sign("1700000000000", "POST", "/api/v1/orders", "{}", "test-secret")
        );
        assert_eq!(signed.body, "{}");
    }
}
