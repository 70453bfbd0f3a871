//! Risk-capped position sizing with a minimum-notional floor.
//!
//! The size risks at most `capital * max_risk_fraction` if the stop is hit.
//! When that size is below the exchange minimum order value, the minimum is
//! used only if it still fits the risk budget; otherwise the trade is skipped.

use rust_decimal::Decimal;

use super::RiskConfig;

/// Why no order size could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSizeReason {
    /// Entry price is not positive or equals the stop
    DegenerateStop,
    /// The minimum order value would risk more than the budget allows
    ExceedsRiskCap,
    /// Inputs produce a size outside the decimal range
    Overflow,
}

/// Result of sizing a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// Base-currency quantity
    Quantity(Decimal),
    /// Deliberate no-op, not a failure
    NoValidSize(NoSizeReason),
}

impl Sizing {
    pub fn quantity(&self) -> Option<Decimal> {
        match self {
            Sizing::Quantity(q) => Some(*q),
            Sizing::NoValidSize(_) => None,
        }
    }
}

/// Size a position.
///
/// Returns the base-currency quantity whose loss at `stop_price` stays within
/// `capital * max_risk_fraction`.
pub fn size(
    entry_price: Decimal,
    stop_price: Decimal,
    capital: Decimal,
    max_risk_fraction: Decimal,
    min_notional: Decimal,
) -> Sizing {
    if entry_price <= Decimal::ZERO {
        return Sizing::NoValidSize(NoSizeReason::DegenerateStop);
    }

    let Some(risk_distance) = (entry_price - stop_price)
        .abs()
        .checked_div(entry_price)
    else {
        return Sizing::NoValidSize(NoSizeReason::Overflow);
    };
    if risk_distance.is_zero() {
        return Sizing::NoValidSize(NoSizeReason::DegenerateStop);
    }

    let Some(risk_budget) = capital.checked_mul(max_risk_fraction) else {
        return Sizing::NoValidSize(NoSizeReason::Overflow);
    };
    let Some(risk_based_notional) = risk_budget.checked_div(risk_distance) else {
        return Sizing::NoValidSize(NoSizeReason::Overflow);
    };

    if risk_based_notional >= min_notional {
        return risk_based_notional
            .checked_div(entry_price)
            .map_or(Sizing::NoValidSize(NoSizeReason::Overflow), Sizing::Quantity);
    }

    let risk_at_min_notional = min_notional.saturating_mul(risk_distance);
    if risk_at_min_notional > risk_budget {
        return Sizing::NoValidSize(NoSizeReason::ExceedsRiskCap);
    }

    min_notional
        .checked_div(entry_price)
        .map_or(Sizing::NoValidSize(NoSizeReason::Overflow), Sizing::Quantity)
}

/// Calculator bound to a risk configuration.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Size a trade against the configured capital and limits.
    pub fn calculate_size(&self, entry_price: Decimal, stop_price: Decimal) -> Sizing {
        size(
            entry_price,
            stop_price,
            self.config.account_capital,
            self.config.max_risk_fraction,
            self.config.min_notional,
        )
    }

    /// Maximum loss allowed on one trade.
    pub fn risk_per_trade(&self) -> Decimal {
        self.config
            .account_capital
            .saturating_mul(self.config.max_risk_fraction)
    }

    /// Stop price `default_stop_fraction` away from entry, on the losing side.
    pub fn default_stop(&self, entry_price: Decimal, is_long: bool) -> Decimal {
        let offset = entry_price.saturating_mul(self.config.default_stop_fraction);
        if is_long {
            entry_price - offset
        } else {
            entry_price + offset
        }
    }
}
