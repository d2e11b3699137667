//! Buy-and-hold baseline.

use rust_decimal::Decimal;

use crate::data::PriceSeries;
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::{cagr, MetricsCalculator, SummaryMetrics};

use super::engine::{EquityCurve, EquityPoint, Evaluator, StrategyOutcome};

/// Invests all capital at the first close and never trades again.
#[derive(Debug, Clone)]
pub struct BuyAndHoldEvaluator {
    initial_capital: Decimal,
    risk_free_rate: f64,
}

impl BuyAndHoldEvaluator {
    pub fn new(initial_capital: Decimal, risk_free_rate: f64) -> Self {
        Self {
            initial_capital,
            risk_free_rate,
        }
    }
}

impl Evaluator for BuyAndHoldEvaluator {
    fn name(&self) -> &str {
        "Buy & Hold"
    }

    fn evaluate(&self, series: &PriceSeries) -> AnalysisResult<StrategyOutcome> {
        let first = series
            .first()
            .ok_or_else(|| AnalysisError::insufficient("buy-and-hold", 1, 0))?;

        let capital: f64 = self.initial_capital.try_into().unwrap_or(0.0);
        let shares = capital / first.close;

        let curve = EquityCurve::new(
            series
                .bars()
                .iter()
                .map(|bar| EquityPoint {
                    date: bar.date,
                    equity: shares * bar.close,
                    invested: self.initial_capital,
                })
                .collect(),
        );

        let returns = curve.implied_returns();
        let risk = MetricsCalculator::risk_metrics(&returns, &curve.values(), self.risk_free_rate)?;

        let final_value = curve.final_equity();
        let profit = final_value - capital;

        let mut summary = SummaryMetrics::for_curve(self.name(), &curve)
            .with_risk(risk)
            .with_drawdown(MetricsCalculator::analyze_drawdown(&curve));
        summary.total_cost = Some(self.initial_capital);
        summary.profit = Some(profit);
        summary.roi = Some(profit / capital);
        summary.total_return = Some(final_value / capital - 1.0);
        summary.cagr = cagr(capital, final_value, returns.len());
        summary.shares_held = Some(shares);

        Ok(StrategyOutcome {
            equity_curve: curve,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::tests::{date, weekday_series};

    #[test]
    fn test_single_purchase_tracks_price() {
        let series = weekday_series(date(2024, 1, 1), &[50.0, 60.0, 45.0, 75.0]);
        let outcome = BuyAndHoldEvaluator::new(Decimal::from(100_000), 0.0)
            .evaluate(&series)
            .unwrap();

        assert_eq!(outcome.summary.shares_held, Some(2000.0));
        assert_eq!(
            outcome.equity_curve.values(),
            vec![100_000.0, 120_000.0, 90_000.0, 150_000.0]
        );
        assert!((outcome.summary.total_return.unwrap() - 0.5).abs() < 1e-12);
        assert!((outcome.summary.max_drawdown.unwrap() + 0.25).abs() < 1e-12);

        let drawdown = outcome.summary.drawdown.unwrap();
        assert_eq!(drawdown.peak_date, Some(date(2024, 1, 2)));
        assert_eq!(drawdown.trough_date, Some(date(2024, 1, 3)));
        assert_eq!(drawdown.recovery_date, Some(date(2024, 1, 4)));
    }

    #[test]
    fn test_risk_metrics_use_asset_returns() {
        let closes = [100.0, 102.0, 99.0, 105.0, 104.0, 110.0];
        let series = weekday_series(date(2024, 1, 1), &closes);
        let outcome = BuyAndHoldEvaluator::new(Decimal::from(10_000), 0.0)
            .evaluate(&series)
            .unwrap();

        let asset_returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        let expected_vol = crate::metrics::annualized_volatility(&asset_returns).unwrap();
        assert!((outcome.summary.annualized_volatility.unwrap() - expected_vol).abs() < 1e-9);
    }

    #[test]
    fn test_constant_price_is_degenerate() {
        let series = weekday_series(date(2024, 1, 1), &[25.0; 30]);
        let summary = BuyAndHoldEvaluator::new(Decimal::from(1_000), 0.0)
            .evaluate(&series)
            .unwrap()
            .summary;

        assert_eq!(summary.annualized_volatility, Some(0.0));
        assert_eq!(summary.max_drawdown, Some(0.0));
        assert_eq!(summary.sharpe_ratio, None);
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let series = PriceSeries::new(Vec::new()).unwrap();
        let err = BuyAndHoldEvaluator::new(Decimal::from(1), 0.0)
            .evaluate(&series)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }
}
