//! Dollar-cost averaging.

use rust_decimal::Decimal;
use tracing::debug;

use crate::data::PriceSeries;
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::{MetricsCalculator, SummaryMetrics};

use super::engine::{EquityCurve, EquityPoint, Evaluator, StrategyOutcome};
use super::schedule::CashFlowSchedule;

/// Buys fractional shares with every scheduled contribution and holds them.
#[derive(Debug, Clone)]
pub struct DcaEvaluator {
    schedule: CashFlowSchedule,
    risk_free_rate: f64,
}

impl DcaEvaluator {
    pub fn new(schedule: CashFlowSchedule, risk_free_rate: f64) -> Self {
        Self {
            schedule,
            risk_free_rate,
        }
    }

    pub fn schedule(&self) -> &CashFlowSchedule {
        &self.schedule
    }
}

impl Evaluator for DcaEvaluator {
    fn name(&self) -> &str {
        "DCA"
    }

    fn evaluate(&self, series: &PriceSeries) -> AnalysisResult<StrategyOutcome> {
        if self.schedule.is_empty() {
            return Err(AnalysisError::insufficient("DCA contribution schedule", 1, 0));
        }

        // Every contribution must land on a trading day in the series.
        let mut purchases = Vec::with_capacity(self.schedule.len());
        for flow in self.schedule.flows() {
            let idx = series
                .position(flow.date)
                .ok_or(AnalysisError::ScheduleMismatch { date: flow.date })?;
            purchases.push((idx, flow.amount));
        }

        let bars = series.bars();
        let mut points = Vec::with_capacity(bars.len());
        let mut shares = 0.0_f64;
        let mut invested = Decimal::ZERO;
        let mut next = purchases.iter().peekable();

        // Time-weighted index: grows only with price moves on held shares.
        let mut index = Vec::new();
        let mut index_dates = Vec::new();
        let mut twr_returns = Vec::new();

        for (idx, bar) in bars.iter().enumerate() {
            let held_before = shares;
            if held_before > 0.0 && idx > 0 {
                let r = bar.close / bars[idx - 1].close - 1.0;
                twr_returns.push(r);
                let prev = index.last().copied().unwrap_or(1.0);
                index.push(prev * (1.0 + r));
                index_dates.push(bar.date);
            }

            while let Some(&&(buy_idx, amount)) = next.peek() {
                if buy_idx != idx {
                    break;
                }
                let cash: f64 = amount.try_into().unwrap_or(0.0);
                shares += cash / bar.close;
                invested += amount;
                if held_before == 0.0 && index.is_empty() {
                    index.push(1.0);
                    index_dates.push(bar.date);
                }
                next.next();
            }

            points.push(EquityPoint {
                date: bar.date,
                equity: shares * bar.close,
                invested,
            });
        }

        let curve = EquityCurve::new(points);
        let total_cost = self.schedule.total();
        let cost: f64 = total_cost.try_into().unwrap_or(0.0);
        let final_value = curve.final_equity();
        let profit = final_value - cost;

        let mut summary = SummaryMetrics::for_curve(self.name(), &curve);
        summary.total_cost = Some(total_cost);
        summary.profit = Some(profit);
        summary.roi = Some(profit / cost);
        summary.shares_held = Some(shares);
        summary.contributions = Some(self.schedule.len());

        if twr_returns.len() >= 2 {
            let risk = MetricsCalculator::risk_metrics(&twr_returns, &index, self.risk_free_rate)?;
            let index_curve = EquityCurve::new(
                index_dates
                    .iter()
                    .zip(&index)
                    .map(|(&date, &equity)| EquityPoint {
                        date,
                        equity,
                        invested: Decimal::ZERO,
                    })
                    .collect(),
            );
            summary = summary
                .with_risk(risk)
                .with_drawdown(MetricsCalculator::analyze_drawdown(&index_curve));
        }

        debug!(
            contributions = self.schedule.len(),
            shares,
            final_value,
            "DCA evaluated"
        );

        Ok(StrategyOutcome {
            equity_curve: curve,
            summary,
        })
    }
}
