//! KuCoin spot trading client.
//!
//! - [`api`]: request signing, order payloads, REST clients
//! - [`trading`]: risk-capped position sizing and sequential batch execution
//! - [`dispatch`]: action-identifier routing for JSON requests

pub mod api;
pub mod dispatch;
pub mod trading;
