//! Strategy simulation over a cleaned daily price series.
//!
//! This module provides:
//! - Dollar-cost averaging on a monthly contribution schedule
//! - A buy-and-hold baseline
//! - Moving-average momentum with configurable execution timing
//! - An engine that runs all three on the same window

pub mod buy_hold;
pub mod dca;
pub mod engine;
pub mod momentum;
pub mod schedule;

pub use buy_hold::BuyAndHoldEvaluator;
pub use dca::DcaEvaluator;
pub use engine::{
    run_all, BacktestConfig, BacktestEngine, EquityCurve, EquityPoint, Evaluator,
    StrategyOutcome, StrategyReport,
};
pub use momentum::{ExecutionTiming, MarketState, MomentumEvaluator, DEFAULT_SMA_WINDOW};
pub use schedule::{CashFlow, CashFlowSchedule, ContributionAnchor};
