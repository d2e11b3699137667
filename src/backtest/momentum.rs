//! Moving-average momentum strategy.
//!
//! Two states, `InCash` and `InMarket`. On each trading day the close is
//! compared with the trailing N-day simple moving average ending on that
//! day; the strategy is invested while the close is above the average and
//! holds cash otherwise. Days before a full window exists are always cash.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::simple_moving_average;
use crate::data::PriceSeries;
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::{cagr, MetricsCalculator, SummaryMetrics};
use crate::regime::RiskOnSignal;

use super::engine::{BacktestConfig, EquityCurve, EquityPoint, Evaluator, StrategyOutcome};

pub const DEFAULT_SMA_WINDOW: usize = 50;

/// When a state decided from day t's close is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTiming {
    /// The state decided at day t earns day t's return.
    #[default]
    SameDay,
    /// The state decided at day t earns day t+1's return.
    NextDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketState {
    InCash,
    InMarket,
}

#[derive(Debug, Clone)]
pub struct MomentumEvaluator {
    initial_capital: Decimal,
    sma_window: usize,
    risk_free_rate: f64,
    timing: ExecutionTiming,
    risk_on: Option<RiskOnSignal>,
}

impl MomentumEvaluator {
    pub fn new(initial_capital: Decimal, sma_window: usize) -> Self {
        Self {
            initial_capital,
            sma_window,
            risk_free_rate: 0.0,
            timing: ExecutionTiming::SameDay,
            risk_on: None,
        }
    }

    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.initial_capital, config.sma_window)
            .with_risk_free_rate(config.risk_free_rate)
            .with_timing(config.execution)
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_timing(mut self, timing: ExecutionTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Only invest on dates the breadth signal marks as risk-on.
    pub fn with_risk_on(mut self, signal: RiskOnSignal) -> Self {
        self.risk_on = Some(signal);
        self
    }

    pub fn sma_window(&self) -> usize {
        self.sma_window
    }

    /// State for every day in `series`.
    pub fn states(&self, series: &PriceSeries) -> AnalysisResult<Vec<MarketState>> {
        if self.sma_window == 0 {
            return Err(AnalysisError::insufficient("momentum SMA window", 1, 0));
        }

        let closes = series.closes();
        let sma = simple_moving_average(&closes, self.sma_window);

        Ok(series
            .bars()
            .iter()
            .zip(sma)
            .map(|(bar, avg)| {
                let above = avg.is_some_and(|avg| bar.close > avg);
                let allowed = self
                    .risk_on
                    .as_ref()
                    .map_or(true, |signal| signal.is_risk_on(bar.date));
                if above && allowed {
                    MarketState::InMarket
                } else {
                    MarketState::InCash
                }
            })
            .collect())
    }
}

impl Evaluator for MomentumEvaluator {
    fn name(&self) -> &str {
        "Momentum"
    }

    fn evaluate(&self, series: &PriceSeries) -> AnalysisResult<StrategyOutcome> {
        let states = self.states(series)?;
        let first = series
            .first()
            .ok_or_else(|| AnalysisError::insufficient("momentum", 1, 0))?;

        let capital: f64 = self.initial_capital.try_into().unwrap_or(0.0);
        let mut equity = capital;
        let mut points = Vec::with_capacity(series.len());
        let mut invested_days = 0usize;

        points.push(EquityPoint {
            date: first.date,
            equity,
            invested: self.initial_capital,
        });

        for (offset, daily) in series.returns().enumerate() {
            let daily = daily?;
            let t = offset + 1;
            let state = match self.timing {
                ExecutionTiming::SameDay => states[t],
                ExecutionTiming::NextDay => states[t - 1],
            };
            if state == MarketState::InMarket {
                equity *= 1.0 + daily.value;
                invested_days += 1;
            }
            points.push(EquityPoint {
                date: daily.date,
                equity,
                invested: self.initial_capital,
            });
        }

        let curve = EquityCurve::new(points);
        let returns = curve.implied_returns();
        let risk = MetricsCalculator::risk_metrics(&returns, &curve.values(), self.risk_free_rate)?;

        let final_value = curve.final_equity();
        let profit = final_value - capital;

        let mut summary = SummaryMetrics::for_curve(self.name(), &curve)
            .with_risk(risk)
            .with_drawdown(MetricsCalculator::analyze_drawdown(&curve));
        summary.profit = Some(profit);
        summary.roi = Some(profit / capital);
        summary.total_return = Some(final_value / capital - 1.0);
        summary.cagr = cagr(capital, final_value, returns.len());
        summary.time_in_market = if returns.is_empty() {
            None
        } else {
            Some(invested_days as f64 / returns.len() as f64)
        };

        debug!(
            sma_window = self.sma_window,
            invested_days,
            final_value,
            "Momentum evaluated"
        );

        Ok(StrategyOutcome {
            equity_curve: curve,
            summary,
        })
    }
}
