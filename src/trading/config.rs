//! Risk and execution configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for position sizing and batch execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Capital the risk fraction applies to, in quote currency (USDT)
    pub account_capital: Decimal,

    /// Maximum fraction of capital lost if the stop is hit (0.0 to 1.0)
    pub max_risk_fraction: Decimal,

    /// Exchange minimum order value in quote currency
    pub min_notional: Decimal,

    /// Decimal places kept when rounding order amounts (always rounded down)
    pub amount_decimals: u32,

    /// Stop distance used when a planned trade has no stop (0.0 to 1.0)
    pub default_stop_fraction: Decimal,

    /// Pause between consecutive order submissions, in milliseconds
    pub order_delay_ms: u64,

    /// Planned trades considered per batch; the rest are skipped
    pub max_trades: usize,
}

impl RiskConfig {
    pub fn order_delay(&self) -> Duration {
        Duration::from_millis(self.order_delay_ms)
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_capital: dec!(1000),
            max_risk_fraction: dec!(0.04),     // 4% per trade
            min_notional: dec!(1.0),           // ~KuCoin spot minimum, $1
            amount_decimals: 6,
            default_stop_fraction: dec!(0.02), // stop 2% from entry
            order_delay_ms: 1000,
            max_trades: 5,
        }
    }
}
