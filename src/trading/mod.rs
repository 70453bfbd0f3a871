//! Trading logic: risk-capped position sizing and sequential order execution.

mod config;
mod executor;
mod position_sizer;

pub use config::RiskConfig;
pub use executor::{ExecutionOutcome, ExecutionReport, PlannedTrade, TradeExecutor};
pub use position_sizer::{size, NoSizeReason, PositionSizer, Sizing};
