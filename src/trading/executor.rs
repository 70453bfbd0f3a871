//! Batch executor: sizes planned trades and submits them one at a time.
//!
//! Orders go out sequentially with a fixed pause between submissions to stay
//! inside exchange rate limits. A transport failure is never resubmitted; the
//! executor looks the order up by clientOid once and reports what it found.

use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{ExchangeResult, KucoinClient, OrderPayload, OrderRequest, OrderSide};

use super::position_sizer::{NoSizeReason, PositionSizer, Sizing};
use super::RiskConfig;

/// A trade idea to be sized and submitted as a market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTrade {
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: Decimal,
    /// Defaults to `default_stop_fraction` away from entry
    #[serde(default)]
    pub stop_price: Option<Decimal>,
}

impl PlannedTrade {
    /// Load a JSON array of planned trades.
    pub fn load_plan(path: &str) -> Result<Vec<PlannedTrade>> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file {}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse plan file {}", path))
    }
}

/// What happened to one planned trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Placed { order_id: String },
    /// The risk gate declined to size the trade
    Skipped { reason: String },
    /// Built but not sent
    DryRun { body: String },
    Invalid { message: String },
    Rejected { code: Option<String>, message: String },
    /// Transport failed and the order could not be found by clientOid
    Unknown { message: String },
}

/// Report for one planned trade.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub quantity: Option<Decimal>,
    pub client_oid: Option<String>,
    pub outcome: ExecutionOutcome,
}

/// Sequential order driver.
pub struct TradeExecutor {
    client: Option<KucoinClient>,
    sizer: PositionSizer,
    delay: Duration,
}

impl TradeExecutor {
    /// Executor that submits orders through `client`.
    pub fn live(client: KucoinClient, config: RiskConfig) -> Self {
        Self {
            client: Some(client),
            delay: config.order_delay(),
            sizer: PositionSizer::new(config),
        }
    }

    /// Executor that sizes and builds orders without sending them.
    pub fn dry_run(config: RiskConfig) -> Self {
        Self {
            client: None,
            delay: config.order_delay(),
            sizer: PositionSizer::new(config),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.client.is_none()
    }

    /// Execute a batch in order, one submission at a time.
    ///
    /// Only the first `max_trades` planned trades are considered; the rest
    /// are reported as skipped.
    pub async fn execute_batch(&self, plans: &[PlannedTrade]) -> Vec<ExecutionReport> {
        let max_trades = self.sizer.config().max_trades;
        info!(
            trades = plans.len(),
            max_trades,
            dry_run = self.is_dry_run(),
            risk_per_trade = %self.sizer.risk_per_trade(),
            "Executing trade batch"
        );

        let mut reports = Vec::with_capacity(plans.len());
        let mut submitted = false;

        for (i, plan) in plans.iter().enumerate() {
            if i >= max_trades {
                info!(symbol = %plan.symbol, max_trades, "Trade limit reached, skipping");
                let mut report = self.report(plan);
                report.outcome = ExecutionOutcome::Skipped {
                    reason: "trade limit reached".to_string(),
                };
                reports.push(report);
                continue;
            }

            let report = match (self.prepare(plan), &self.client) {
                (Prepared::Done(report), _) => report,
                (Prepared::Ready(mut report, payload), None) => {
                    info!(
                        symbol = %plan.symbol,
                        side = plan.side.as_str(),
                        amount = payload.amount().unwrap_or_default(),
                        "[DRY RUN] Would place order"
                    );
                    report.outcome = ExecutionOutcome::DryRun {
                        body: payload.to_body(),
                    };
                    report
                }
                (Prepared::Ready(mut report, payload), Some(client)) => {
                    if submitted && !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    report.outcome = submit(client, &payload).await;
                    submitted = true;
                    report
                }
            };
            reports.push(report);
        }

        reports
    }

    fn report(&self, plan: &PlannedTrade) -> ExecutionReport {
        let is_long = plan.side == OrderSide::Buy;
        ExecutionReport {
            symbol: plan.symbol.clone(),
            side: plan.side,
            entry_price: plan.entry_price,
            stop_price: plan
                .stop_price
                .unwrap_or_else(|| self.sizer.default_stop(plan.entry_price, is_long)),
            quantity: None,
            client_oid: None,
            outcome: ExecutionOutcome::Skipped {
                reason: String::new(),
            },
        }
    }

    fn prepare(&self, plan: &PlannedTrade) -> Prepared {
        let mut report = self.report(plan);
        let skip = |mut report: ExecutionReport, reason: &str| {
            info!(symbol = %plan.symbol, reason, "Skipping trade");
            report.outcome = ExecutionOutcome::Skipped {
                reason: reason.to_string(),
            };
            Prepared::Done(report)
        };

        let quantity = match self.sizer.calculate_size(plan.entry_price, report.stop_price) {
            Sizing::Quantity(q) => q,
            Sizing::NoValidSize(reason) => {
                let reason = match reason {
                    NoSizeReason::DegenerateStop => "degenerate stop",
                    NoSizeReason::ExceedsRiskCap => "minimum order value exceeds risk cap",
                    NoSizeReason::Overflow => "size out of range",
                };
                return skip(report, reason);
            }
        };

        let Some(notional) = quantity.checked_mul(plan.entry_price) else {
            return skip(report, "size out of range");
        };

        // Market buys are sized in quote funds, market sells in base size.
        // Both round down so the order never risks more than the budget.
        let config = self.sizer.config();
        let round_down = |d: Decimal| {
            d.round_dp_with_strategy(config.amount_decimals, RoundingStrategy::ToZero)
                .normalize()
        };
        let quantity = round_down(quantity);
        let (amount, order_value) = match plan.side {
            OrderSide::Buy => {
                let funds = round_down(notional);
                (funds, funds)
            }
            OrderSide::Sell => (quantity, quantity.saturating_mul(plan.entry_price)),
        };
        report.quantity = Some(quantity);

        if order_value < config.min_notional {
            return skip(report, "order value below minimum after rounding");
        }

        let request = OrderRequest::market(&plan.symbol, plan.side, amount);
        let payload = match OrderPayload::build(&request) {
            Ok(p) => p,
            Err(e) => {
                warn!(symbol = %plan.symbol, error = %e, "Invalid order");
                report.outcome = ExecutionOutcome::Invalid {
                    message: e.to_string(),
                };
                return Prepared::Done(report);
            }
        };
        report.client_oid = Some(payload.client_oid.clone());

        Prepared::Ready(report, payload)
    }
}

async fn submit(client: &KucoinClient, payload: &OrderPayload) -> ExecutionOutcome {
    match client.place_order(payload).await {
        ExchangeResult::Success(placed) => ExecutionOutcome::Placed {
            order_id: placed.order_id,
        },
        ExchangeResult::Rejected { code, message } => ExecutionOutcome::Rejected { code, message },
        ExchangeResult::TransportError { message } => reconcile(client, payload, message).await,
    }
}

/// Look the order up once by clientOid after a transport failure.
async fn reconcile(client: &KucoinClient, payload: &OrderPayload, message: String) -> ExecutionOutcome {
    match client.get_order_by_client_oid(&payload.client_oid).await {
        Ok(ExchangeResult::Success(details)) => {
            info!(
                client_oid = %payload.client_oid,
                order_id = %details.id,
                "Order found after transport error"
            );
            ExecutionOutcome::Placed {
                order_id: details.id,
            }
        }
        other => {
            warn!(
                client_oid = %payload.client_oid,
                lookup = ?other,
                "Order outcome still unknown; not resubmitting"
            );
            ExecutionOutcome::Unknown { message }
        }
    }
}

enum Prepared {
    Done(ExecutionReport),
    Ready(ExecutionReport, OrderPayload),
}
