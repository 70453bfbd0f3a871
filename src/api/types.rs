//! KuCoin REST response types and result classification.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The exchange's own success code, distinct from the HTTP status.
pub const SUCCESS_CODE: &str = "200000";

/// Outcome of one exchange call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeResult<T> {
    Success(T),
    /// The exchange declined the request. `code` and `message` are verbatim.
    Rejected {
        code: Option<String>,
        message: String,
    },
    /// Network or parse failure. For order placement the outcome is unknown.
    TransportError { message: String },
}

impl<T> ExchangeResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExchangeResult<U> {
        self.and_then(|v| ExchangeResult::Success(f(v)))
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> ExchangeResult<U>) -> ExchangeResult<U> {
        match self {
            Self::Success(v) => f(v),
            Self::Rejected { code, message } => ExchangeResult::Rejected { code, message },
            Self::TransportError { message } => ExchangeResult::TransportError { message },
        }
    }

    /// Convert into `anyhow::Result` for callers that only want the payload.
    pub fn into_result(self) -> anyhow::Result<T> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Rejected { code: Some(code), message } => {
                Err(anyhow::anyhow!("KuCoin rejected request: {} (code {})", message, code))
            }
            Self::Rejected { code: None, message } => {
                Err(anyhow::anyhow!("KuCoin rejected request: {}", message))
            }
            Self::TransportError { message } => {
                Err(anyhow::anyhow!("Transport error (outcome unknown): {}", message))
            }
        }
    }
}

/// Identifier returned by `POST /api/v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: String,
}

/// Result of an order placement attempt.
pub type OrderResult = ExchangeResult<PlacedOrder>;

/// Classify a raw response body. `status` is only used in messages.
pub fn classify_body(status: u16, body: &str) -> ExchangeResult<Value> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return ExchangeResult::TransportError {
                message: format!("Non-JSON response (HTTP {}): {}", status, e),
            }
        }
    };

    // Only the string sentinel counts as success; a numeric code is reported as-is.
    let (code, is_success) = match value.get("code") {
        Some(Value::String(s)) => (Some(s.clone()), s == SUCCESS_CODE),
        Some(Value::Number(n)) => (Some(n.to_string()), false),
        _ => (None, false),
    };
    let message = value.get("msg").and_then(Value::as_str).map(str::to_string);

    if is_success {
        return ExchangeResult::Success(value.get("data").cloned().unwrap_or(Value::Null));
    }

    match code {
        Some(_) => ExchangeResult::Rejected {
            code,
            message: message.unwrap_or_else(|| format!("HTTP {}", status)),
        },
        None => ExchangeResult::Rejected {
            code: None,
            message: message
                .unwrap_or_else(|| format!("Response missing code field (HTTP {})", status)),
        },
    }
}

/// Decode a success payload; a shape mismatch is a malformed success.
pub fn decode_data<T: DeserializeOwned>(data: Value) -> ExchangeResult<T> {
    match serde_json::from_value(data) {
        Ok(v) => ExchangeResult::Success(v),
        Err(e) => ExchangeResult::Rejected {
            code: Some(SUCCESS_CODE.to_string()),
            message: format!("malformed success response: {}", e),
        },
    }
}

/// Extract the order id from a placement response's `data`.
pub fn decode_placed_order(data: Value) -> OrderResult {
    let order_id = data
        .get("orderId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty());

    match order_id {
        Some(id) => ExchangeResult::Success(PlacedOrder {
            order_id: id.to_string(),
        }),
        None => ExchangeResult::Rejected {
            code: Some(SUCCESS_CODE.to_string()),
            message: "malformed success response: missing orderId".to_string(),
        },
    }
}

/// Entry of `GET /api/v1/market/allTickers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    #[serde(default)]
    pub symbol_name: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub buy: Option<String>,
    #[serde(default)]
    pub sell: Option<String>,
    #[serde(default)]
    pub vol_value: Option<String>,
}

impl Ticker {
    /// Last traded price, if present and numeric.
    pub fn last_price(&self) -> Option<Decimal> {
        self.last.as_deref().and_then(|s| s.parse().ok())
    }
}

/// `data` of `GET /api/v1/market/allTickers`.
#[derive(Debug, Clone, Deserialize)]
pub struct AllTickers {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub ticker: Vec<Ticker>,
}

/// Entry of `GET /api/v1/accounts`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountBalance {
    pub id: String,
    pub currency: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub balance: Decimal,
    pub available: Decimal,
    pub holds: Decimal,
}

/// `data` of `GET /api/v1/orders/{orderId}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub funds: Option<String>,
    #[serde(default)]
    pub deal_funds: Option<String>,
    #[serde(default)]
    pub deal_size: Option<String>,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub fee_currency: Option<String>,
    #[serde(default)]
    pub stop: Option<String>,
    #[serde(default)]
    pub stop_price: Option<String>,
    #[serde(default)]
    pub time_in_force: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub cancel_exist: bool,
    #[serde(default)]
    pub client_oid: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl OrderDetails {
    pub fn status_label(&self) -> &'static str {
        if self.is_active {
            "active"
        } else if self.cancel_exist {
            "cancelled"
        } else {
            "done"
        }
    }
}
