//! Typed errors raised before any request reaches the exchange.

use thiserror::Error;

/// Missing or malformed process configuration. Fatal at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A credential field is absent or empty
    #[error("Missing KuCoin credential: {0}")]
    MissingCredential(&'static str),
    /// A credential that cannot be sent as an HTTP header value
    #[error("Invalid characters in KuCoin credential: {0}")]
    InvalidCredential(&'static str),
    /// KC-API-KEY-VERSION is not 1, 2 or 3
    #[error("Unsupported API key version: {0}")]
    UnsupportedKeyVersion(String),
}

/// Caller-supplied order data that cannot be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid symbol '{0}': expected BASE-QUOTE")]
    InvalidSymbol(String),
    #[error("Invalid side '{0}': expected buy or sell")]
    InvalidSide(String),
    #[error("Invalid order type '{0}': expected market or limit")]
    InvalidOrderType(String),
    #[error("Invalid size '{0}': must be a positive decimal")]
    InvalidSize(String),
    #[error("Limit order requires a positive price")]
    MissingLimitPrice,
    #[error("Invalid price '{0}': must be a positive decimal")]
    InvalidPrice(String),
    #[error("Invalid stop price '{0}': must be a positive decimal")]
    InvalidStopPrice(String),
    #[error("Invalid time in force '{0}': expected GTC, GTT, IOC or FOK")]
    InvalidTimeInForce(String),
    #[error("Invalid order id '{0}': expected letters, digits, '-' or '_'")]
    InvalidOrderId(String),
}
