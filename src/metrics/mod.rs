//! Performance metrics module.
//!
//! Provides the risk and return calculations shared by every strategy:
//! - Maximum drawdown and drawdown periods
//! - Annualized volatility (252 trading days)
//! - Sharpe ratio
//! - Total return and CAGR

pub mod calculator;

pub use calculator::{
    annualized_volatility, cagr, max_drawdown, sharpe_ratio, total_return, DrawdownAnalysis,
    MetricsCalculator, RiskMetrics, SummaryMetrics, TRADING_DAYS_PER_YEAR,
};
