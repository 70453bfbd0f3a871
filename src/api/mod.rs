//! KuCoin API: request signing, order payloads, and REST clients.

mod error;
mod kucoin_client;
mod market_client;
mod order_builder;
mod signer;
mod types;

pub use error::{ConfigError, ValidationError};
pub use kucoin_client::KucoinClient;
pub use market_client::{MarketClient, MarketSnapshot, DEFAULT_SYMBOLS, KUCOIN_URL};
pub use order_builder::{
    build_order_payload, OrderPayload, OrderRequest, OrderSide, OrderType, RawOrderData,
    StopKind, TimeInForce,
};
pub use signer::{encode_passphrase, sign, Credentials, KeyVersion, SignedRequest};
pub use types::{
    AccountBalance, ExchangeResult, OrderDetails, OrderResult, PlacedOrder, Ticker, SUCCESS_CODE,
};
