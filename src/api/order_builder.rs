//! Order payload construction for `POST /api/v1/orders`.
//!
//! KuCoin field selection rules:
//! - market buy spends `funds` (quote currency)
//! - market sell sells `size` (base currency)
//! - limit orders carry both `price` and `size`, plus `timeInForce`

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(ValidationError::InvalidSide(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(Self::Market),
            "limit" => Ok(Self::Limit),
            _ => Err(ValidationError::InvalidOrderType(s.to_string())),
        }
    }
}

/// Time in force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good till cancelled
    #[default]
    Gtc,
    /// Good till time
    Gtt,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

impl TimeInForce {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_uppercase().as_str() {
            "GTC" => Ok(Self::Gtc),
            "GTT" => Ok(Self::Gtt),
            "IOC" => Ok(Self::Ioc),
            "FOK" => Ok(Self::Fok),
            _ => Err(ValidationError::InvalidTimeInForce(s.to_string())),
        }
    }
}

/// Stop trigger direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    /// Triggers when the last price falls to or below stopPrice
    Loss,
    /// Triggers when the last price rises to or above stopPrice
    Entry,
}

/// Order fields as supplied by a caller, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderData {
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<String>,
}

/// A validated order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub size: Decimal,
    /// Present iff `order_type` is Limit
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Market order for `size` (quote funds for buys, base size for sells).
    pub fn market(symbol: &str, side: OrderSide, size: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            size,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::default(),
        }
    }

    /// Good-till-cancelled limit order.
    pub fn limit(symbol: &str, side: OrderSide, size: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Limit,
            size,
            price: Some(price),
            stop_price: None,
            time_in_force: TimeInForce::default(),
        }
    }

    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    /// Validate raw caller data.
    pub fn from_raw(raw: &RawOrderData) -> Result<Self, ValidationError> {
        let order_type = OrderType::parse(&raw.order_type)?;
        let price = match order_type {
            OrderType::Limit => {
                let p = raw
                    .price
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or(ValidationError::MissingLimitPrice)?;
                Some(parse_positive(p).ok_or_else(|| ValidationError::InvalidPrice(p.to_string()))?)
            }
            OrderType::Market => None,
        };
        let stop_price = match raw.stop_price.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => Some(
                parse_positive(s).ok_or_else(|| ValidationError::InvalidStopPrice(s.to_string()))?,
            ),
            None => None,
        };
        let time_in_force = match raw.time_in_force.as_deref() {
            Some(t) => TimeInForce::parse(t)?,
            None => TimeInForce::default(),
        };

        let request = Self {
            symbol: raw.symbol.trim().to_string(),
            side: OrderSide::parse(&raw.side)?,
            order_type,
            size: parse_positive(&raw.size)
                .ok_or_else(|| ValidationError::InvalidSize(raw.size.clone()))?,
            price,
            stop_price,
            time_in_force,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check the invariants the typed fields cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_pair_symbol(&self.symbol) {
            return Err(ValidationError::InvalidSymbol(self.symbol.clone()));
        }
        if self.size <= Decimal::ZERO {
            return Err(ValidationError::InvalidSize(self.size.to_string()));
        }
        if self.order_type == OrderType::Limit {
            match self.price {
                Some(p) if p > Decimal::ZERO => {}
                _ => return Err(ValidationError::MissingLimitPrice),
            }
        }
        if let Some(stop) = self.stop_price {
            if stop <= Decimal::ZERO {
                return Err(ValidationError::InvalidStopPrice(stop.to_string()));
            }
        }
        Ok(())
    }
}

/// Order body as sent to the exchange. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub client_oid: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funds: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
}

impl OrderPayload {
    /// Build the payload with a fresh clientOid.
    pub fn build(request: &OrderRequest) -> Result<Self, ValidationError> {
        request.validate()?;

        let amount = request.size.to_string();
        let (funds, size, price, time_in_force) = match (request.order_type, request.side) {
            (OrderType::Market, OrderSide::Buy) => (Some(amount), None, None, None),
            (OrderType::Market, OrderSide::Sell) => (None, Some(amount), None, None),
            (OrderType::Limit, _) => (
                None,
                Some(amount),
                request.price.map(|p| p.to_string()),
                Some(request.time_in_force),
            ),
        };

        let stop = request.stop_price.map(|_| match request.side {
            OrderSide::Buy => StopKind::Loss,
            OrderSide::Sell => StopKind::Entry,
        });

        Ok(Self {
            client_oid: uuid::Uuid::new_v4().to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            funds,
            size,
            price,
            time_in_force,
            stop,
            stop_price: request.stop_price.map(|p| p.to_string()),
        })
    }

    /// Serialized JSON body. This exact string is both signed and sent.
    pub fn to_body(&self) -> String {
        // Only strings and unit enums: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Quote funds for market buys, base size otherwise.
    pub fn amount(&self) -> Option<&str> {
        self.funds.as_deref().or(self.size.as_deref())
    }
}

/// Build the JSON body for an order.
pub fn build_order_payload(request: &OrderRequest) -> Result<String, ValidationError> {
    Ok(OrderPayload::build(request)?.to_body())
}

fn is_pair_symbol(symbol: &str) -> bool {
    match symbol.split_once('-') {
        Some((base, quote)) => !base.is_empty() && !quote.is_empty() && !quote.contains('-'),
        None => false,
    }
}

fn parse_positive(s: &str) -> Option<Decimal> {
    Decimal::from_str(s.trim()).ok().filter(|d| *d > Decimal::ZERO)
}
