//! Action dispatcher: maps an action identifier to a typed handler.
//!
//! Requests look like `{"action": "place_order", "orderData": {...}}` and
//! every handler answers with the same envelope:
//! `{"success": bool, "outcome": "...", "data"?, "code"?, "error"?}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::{
    ConfigError, ExchangeResult, KucoinClient, MarketClient, OrderPayload, OrderRequest,
    RawOrderData, DEFAULT_SYMBOLS,
};

/// One request to the dispatcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    GetMarketData {
        #[serde(default)]
        symbols: Vec<String>,
    },
    PlaceOrder {
        #[serde(rename = "orderData")]
        order_data: RawOrderData,
    },
    GetAccount,
    GetOrder {
        #[serde(rename = "orderId", default)]
        order_id: Option<String>,
        #[serde(rename = "clientOid", default)]
        client_oid: Option<String>,
    },
}

impl ActionRequest {
    pub const ACTIONS: [&'static str; 4] = ["get_market_data", "place_order", "get_account", "get_order"];
}

/// Outcome class reported alongside `success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Rejected,
    TransportError,
    ValidationError,
    ConfigurationError,
    InvalidRequest,
}

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    fn ok(data: Value) -> Self {
        Self {
            success: true,
            outcome: Outcome::Success,
            data: Some(data),
            code: None,
            error: None,
        }
    }

    fn failed(outcome: Outcome, code: Option<String>, error: String) -> Self {
        Self {
            success: false,
            outcome,
            data: None,
            code,
            error: Some(error),
        }
    }

    fn from_result<T>(result: ExchangeResult<T>, to_data: impl FnOnce(T) -> Value) -> Self {
        match result {
            ExchangeResult::Success(v) => Self::ok(to_data(v)),
            ExchangeResult::Rejected { code, message } => {
                Self::failed(Outcome::Rejected, code, message)
            }
            ExchangeResult::TransportError { message } => {
                Self::failed(Outcome::TransportError, None, message)
            }
        }
    }
}

/// Routes action requests to the market and account clients.
pub struct Dispatcher {
    market: MarketClient,
    account: Result<KucoinClient, ConfigError>,
}

impl Dispatcher {
    /// `account` carries the start-up credential error, if any; public
    /// market data is served either way.
    pub fn new(market: MarketClient, account: Result<KucoinClient, ConfigError>) -> Self {
        Self { market, account }
    }

    /// Parse and handle a JSON request.
    pub async fn handle_json(&self, raw: &str) -> ActionResponse {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                return ActionResponse::failed(
                    Outcome::InvalidRequest,
                    None,
                    format!("Invalid JSON request: {}", e),
                )
            }
        };

        let action = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !ActionRequest::ACTIONS.contains(&action.as_str()) {
            return ActionResponse::failed(
                Outcome::InvalidRequest,
                None,
                format!("Unknown action: {}", action),
            );
        }

        match serde_json::from_value::<ActionRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => ActionResponse::failed(
                Outcome::InvalidRequest,
                None,
                format!("Invalid {} request: {}", action, e),
            ),
        }
    }

    /// Handle a typed request.
    pub async fn handle(&self, request: ActionRequest) -> ActionResponse {
        match request {
            ActionRequest::GetMarketData { symbols } => self.get_market_data(symbols).await,
            ActionRequest::PlaceOrder { order_data } => self.place_order(&order_data).await,
            ActionRequest::GetAccount => self.get_account().await,
            ActionRequest::GetOrder {
                order_id,
                client_oid,
            } => self.get_order(order_id, client_oid).await,
        }
    }

    fn account_client(&self) -> Result<&KucoinClient, ActionResponse> {
        self.account.as_ref().map_err(|e| {
            ActionResponse::failed(Outcome::ConfigurationError, None, e.to_string())
        })
    }

    async fn get_market_data(&self, symbols: Vec<String>) -> ActionResponse {
        let symbols = if symbols.is_empty() {
            DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
        } else {
            symbols
        };

        let result = self.market.get_market_data(&symbols).await;
        ActionResponse::from_result(result, |snapshot| json!(snapshot))
    }

    async fn place_order(&self, order_data: &RawOrderData) -> ActionResponse {
        let client = match self.account_client() {
            Ok(c) => c,
            Err(response) => return response,
        };

        let payload = match OrderRequest::from_raw(order_data).and_then(|r| OrderPayload::build(&r)) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Rejected order data before submission");
                return ActionResponse::failed(Outcome::ValidationError, None, e.to_string());
            }
        };

        let client_oid = payload.client_oid.clone();
        let result = client.place_order(&payload).await;
        info!(client_oid = %client_oid, success = result.is_success(), "place_order handled");

        match result {
            ExchangeResult::TransportError { message } => {
                // Caller must reconcile with get_order before resubmitting.
                let mut response = ActionResponse::failed(Outcome::TransportError, None, message);
                response.data = Some(json!({ "clientOid": client_oid }));
                response
            }
            other => ActionResponse::from_result(other, |placed| {
                json!({ "orderId": placed.order_id, "clientOid": client_oid })
            }),
        }
    }

    async fn get_account(&self) -> ActionResponse {
        let client = match self.account_client() {
            Ok(c) => c,
            Err(response) => return response,
        };
        ActionResponse::from_result(client.get_accounts().await, |accounts| json!(accounts))
    }

    async fn get_order(&self, order_id: Option<String>, client_oid: Option<String>) -> ActionResponse {
        let client = match self.account_client() {
            Ok(c) => c,
            Err(response) => return response,
        };

        let result = match (order_id, client_oid) {
            (Some(id), _) => client.get_order(&id).await,
            (None, Some(oid)) => client.get_order_by_client_oid(&oid).await,
            (None, None) => {
                return ActionResponse::failed(
                    Outcome::InvalidRequest,
                    None,
                    "get_order requires orderId or clientOid".to_string(),
                )
            }
        };

        match result {
            Ok(result) => ActionResponse::from_result(result, |details| json!(details)),
            Err(e) => ActionResponse::failed(Outcome::ValidationError, None, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Credentials, KeyVersion};
    use httpmock::prelude::*;

    fn dispatcher(server: &MockServer, with_credentials: bool) -> Dispatcher {
        let market = MarketClient::with_base_url(server.base_url()).unwrap();
        let account = if with_credentials {
            let creds = Credentials::new("k", "s", "p", KeyVersion::V2).unwrap();
            Ok(KucoinClient::with_base_url(creds, server.base_url()).unwrap())
        } else {
            Err(ConfigError::MissingCredential("KUCOIN_API_KEY"))
        };
        Dispatcher::new(market, account)
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let server = MockServer::start_async().await;
        let response = dispatcher(&server, true).handle_json(r#"{"action": "withdraw"}"#).await;
        assert!(!response.success);
        assert_eq!(response.outcome, Outcome::InvalidRequest);
        assert_eq!(response.error.as_deref(), Some("Unknown action: withdraw"));
    }

    #[tokio::test]
    async fn test_market_data_without_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/market/allTickers");
                then.status(200).json_body(json!({
                    "code": "200000",
                    "data": {"time": 1, "ticker": [{"symbol": "SOL-USDT", "last": "150.2"}]}
                }));
            })
            .await;

        let response = dispatcher(&server, false)
            .handle_json(r#"{"action": "get_market_data", "symbols": ["SOL-USDT"]}"#)
            .await;

        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data["symbols"], json!(["SOL-USDT"]));
        assert_eq!(data["prices"]["SOL-USDT"], json!("150.2"));
    }

    #[tokio::test]
    async fn test_private_action_without_credentials() {
        // No mocks registered: any request would come back as a rejection.
        let server = MockServer::start_async().await;
        let response = dispatcher(&server, false)
            .handle_json(r#"{"action": "get_account"}"#)
            .await;

        assert_eq!(response.outcome, Outcome::ConfigurationError);
        assert_eq!(
            response.error.as_deref(),
            Some("Missing KuCoin credential: KUCOIN_API_KEY")
        );
    }

    #[tokio::test]
    async fn test_place_order_validation_makes_no_call() {
        let server = MockServer::start_async().await;
        let response = dispatcher(&server, true)
            .handle_json(
                r#"{"action": "place_order", "orderData": {"symbol": "BTCUSDT", "side": "buy", "type": "market", "size": "10"}}"#,
            )
            .await;

        assert_eq!(response.outcome, Outcome::ValidationError);
        assert_eq!(
            response.error.as_deref(),
            Some("Invalid symbol 'BTCUSDT': expected BASE-QUOTE")
        );
    }

    #[tokio::test]
    async fn test_place_order_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/orders").body_includes(r#""size":"0.5""#);
                then.status(200)
                    .json_body(json!({"code": "200000", "data": {"orderId": "abc"}}));
            })
            .await;

        let response = dispatcher(&server, true)
            .handle_json(
                r#"{"action": "place_order", "orderData": {"symbol": "ETH-USDT", "side": "sell", "type": "market", "size": "0.5"}}"#,
            )
            .await;

        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data["orderId"], json!("abc"));
        assert!(data["clientOid"].is_string());
    }

    #[tokio::test]
    async fn test_get_order_requires_identifier() {
        let server = MockServer::start_async().await;
        let response = dispatcher(&server, true).handle_json(r#"{"action": "get_order"}"#).await;
        assert_eq!(response.outcome, Outcome::InvalidRequest);
    }

    #[tokio::test]
    async fn test_get_order_rejects_path_like_id() {
        let server = MockServer::start_async().await;
        let response = dispatcher(&server, true)
            .handle_json(r#"{"action": "get_order", "orderId": "../accounts"}"#)
            .await;
        assert_eq!(response.outcome, Outcome::ValidationError);
        assert!(response.data.is_none());
    }
}
