//! Performance metrics calculator.
//!
//! Pure functions over return series and equity curves, plus the
//! `SummaryMetrics` record every strategy evaluator produces.

use std::fmt::Write as _;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::warn;

use crate::backtest::EquityCurve;
use crate::error::{AnalysisError, AnalysisResult};

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary figures for one strategy run.
///
/// Which fields are populated depends on the strategy: DCA reports cost
/// basis and contributions, momentum reports time in market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub strategy: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub trading_days: usize,

    // Cost and value
    pub total_cost: Option<Decimal>,
    pub final_value: f64,
    pub profit: Option<f64>,
    pub roi: Option<f64>,
    pub shares_held: Option<f64>,
    pub contributions: Option<usize>,

    // Returns
    pub total_return: Option<f64>,
    pub cagr: Option<f64>,

    // Risk
    pub max_drawdown: Option<f64>,
    pub annualized_volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,

    pub time_in_market: Option<f64>,

    /// Dates around the deepest decline.
    pub drawdown: Option<DrawdownAnalysis>,
}

impl SummaryMetrics {
    /// An empty record for `strategy` spanning the given curve.
    pub fn for_curve(strategy: &str, curve: &EquityCurve) -> Self {
        Self {
            strategy: strategy.to_string(),
            start_date: curve.first().map(|p| p.date),
            end_date: curve.last().map(|p| p.date),
            trading_days: curve.len(),
            total_cost: None,
            final_value: curve.final_equity(),
            profit: None,
            roi: None,
            shares_held: None,
            contributions: None,
            total_return: None,
            cagr: None,
            max_drawdown: None,
            annualized_volatility: None,
            sharpe_ratio: None,
            time_in_market: None,
            drawdown: None,
        }
    }

    pub fn with_risk(mut self, risk: RiskMetrics) -> Self {
        self.max_drawdown = Some(risk.max_drawdown);
        self.annualized_volatility = Some(risk.annualized_volatility);
        self.sharpe_ratio = risk.sharpe_ratio;
        self
    }

    pub fn with_drawdown(mut self, drawdown: DrawdownAnalysis) -> Self {
        self.drawdown = Some(drawdown);
        self
    }

    /// Generate a summary report.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let title = format!("{} Results", self.strategy);
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}", "=".repeat(title.len()));

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            let _ = writeln!(
                out,
                "Period: {} to {} ({} days)",
                start, end, self.trading_days
            );
        }
        if let Some(contributions) = self.contributions {
            let _ = writeln!(out, "Contributions: {}", contributions);
        }
        if let Some(cost) = self.total_cost {
            let _ = writeln!(out, "Total Cost: ${:.2}", cost);
        }
        let _ = writeln!(out, "Final Value: ${:.2}", self.final_value);
        if let Some(profit) = self.profit {
            let _ = writeln!(out, "Profit: ${:.2}", profit);
        }
        if let Some(roi) = self.roi {
            let _ = writeln!(out, "ROI: {:.2}%", roi * 100.0);
        }
        if let Some(shares) = self.shares_held {
            let _ = writeln!(out, "Shares Held: {:.4}", shares);
        }
        if let Some(total_return) = self.total_return {
            let _ = writeln!(out, "Total Return: {:.2}%", total_return * 100.0);
        }
        if let Some(cagr) = self.cagr {
            let _ = writeln!(out, "CAGR: {:.2}%", cagr * 100.0);
        }
        if let Some(mdd) = self.max_drawdown {
            let _ = writeln!(out, "Max Drawdown: {:.2}%", mdd * 100.0);
        }
        if let Some(dd) = &self.drawdown {
            if let (Some(peak), Some(trough)) = (dd.peak_date, dd.trough_date) {
                let recovery = dd
                    .recovery_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "not recovered".to_string());
                let _ = writeln!(
                    out,
                    "Drawdown Dates: peak {}, trough {}, recovery {}",
                    peak, trough, recovery
                );
            }
        }
        if let Some(vol) = self.annualized_volatility {
            let _ = writeln!(out, "Volatility (ann.): {:.2}%", vol * 100.0);
        }
        match (self.annualized_volatility, self.sharpe_ratio) {
            (_, Some(sharpe)) => {
                let _ = writeln!(out, "Sharpe Ratio: {:.3}", sharpe);
            }
            (Some(_), None) => {
                let _ = writeln!(out, "Sharpe Ratio: n/a (zero volatility)");
            }
            (None, None) => {}
        }
        if let Some(tim) = self.time_in_market {
            let _ = writeln!(out, "Time in Market: {:.1}%", tim * 100.0);
        }
        out
    }
}

/// Drawdown, volatility and Sharpe for one path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    /// `None` when volatility is exactly zero.
    pub sharpe_ratio: Option<f64>,
}

/// Drawdown analysis details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    /// Deepest decline as a fraction of the running peak (<= 0).
    pub max_drawdown: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    /// First date the curve regained the pre-trough peak.
    pub recovery_date: Option<NaiveDate>,
    pub drawdown_periods: usize,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Drawdown, volatility and Sharpe for a return series and the equity
    /// path it produced. A zero-volatility Sharpe is reported as `None`.
    pub fn risk_metrics(
        returns: &[f64],
        equity: &[f64],
        risk_free_rate: f64,
    ) -> AnalysisResult<RiskMetrics> {
        let annualized_volatility = annualized_volatility(returns)?;
        let sharpe_ratio = match sharpe_ratio(returns, risk_free_rate) {
            Ok(sharpe) => Some(sharpe),
            Err(AnalysisError::DivisionByZero { context }) => {
                warn!(%context, "Sharpe ratio undefined, reporting as n/a");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(RiskMetrics {
            max_drawdown: max_drawdown(equity),
            annualized_volatility,
            sharpe_ratio,
        })
    }

    /// Analyze drawdown from an equity curve.
    pub fn analyze_drawdown(curve: &EquityCurve) -> DrawdownAnalysis {
        let points = curve.points();
        let Some(first) = points.first() else {
            return DrawdownAnalysis {
                max_drawdown: 0.0,
                peak_date: None,
                trough_date: None,
                recovery_date: None,
                drawdown_periods: 0,
            };
        };

        let mut peak = first.equity;
        let mut peak_date = first.date;
        let mut in_drawdown = false;
        let mut periods = 0;

        let mut max_dd = 0.0_f64;
        let mut max_peak: Option<(NaiveDate, f64)> = None;
        let mut trough_date = None;
        let mut recovery_date = None;

        for point in points {
            if point.equity >= peak {
                if in_drawdown {
                    periods += 1;
                    in_drawdown = false;
                }
                if let Some((_, worst_peak)) = max_peak {
                    if recovery_date.is_none() && point.equity >= worst_peak {
                        recovery_date = Some(point.date);
                    }
                }
                peak = point.equity;
                peak_date = point.date;
                continue;
            }

            in_drawdown = true;
            let dd = if peak > 0.0 { point.equity / peak - 1.0 } else { 0.0 };
            if dd < max_dd {
                max_dd = dd;
                max_peak = Some((peak_date, peak));
                trough_date = Some(point.date);
                recovery_date = None;
            }
        }

        if in_drawdown {
            periods += 1;
        }

        DrawdownAnalysis {
            max_drawdown: max_dd,
            peak_date: max_peak.map(|(d, _)| d),
            trough_date,
            recovery_date,
            drawdown_periods: periods,
        }
    }
}

/// Maximum drawdown of an equity path.
///
/// `min_t(equity[t] / max(equity[..=t]) - 1)`, in (-1, 0]. Points with a
/// non-positive running peak contribute 0.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min(value / peak - 1.0);
        }
    }
    worst
}

/// Sample standard deviation of daily returns scaled by sqrt(252).
pub fn annualized_volatility(returns: &[f64]) -> AnalysisResult<f64> {
    if returns.len() < 2 {
        return Err(AnalysisError::insufficient(
            "annualized volatility",
            2,
            returns.len(),
        ));
    }
    Ok(returns.iter().std_dev() * TRADING_DAYS_PER_YEAR.sqrt())
}

/// `(mean daily return * 252 - rf) / annualized volatility`.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> AnalysisResult<f64> {
    let vol = annualized_volatility(returns)?;
    if vol == 0.0 {
        return Err(AnalysisError::DivisionByZero {
            context: "Sharpe ratio (annualized volatility is zero)".to_string(),
        });
    }
    let annual_return = returns.iter().mean() * TRADING_DAYS_PER_YEAR;
    Ok((annual_return - risk_free_rate) / vol)
}

/// Compounded return of a daily return series.
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Compound annual growth rate, with 252 trading days per year.
pub fn cagr(initial: f64, final_value: f64, trading_days: usize) -> Option<f64> {
    if initial <= 0.0 || final_value < 0.0 || trading_days == 0 {
        return None;
    }
    let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
    Some((final_value / initial).powf(1.0 / years) - 1.0)
}
