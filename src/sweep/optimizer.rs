//! Parallel SMA window sweep.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::info;

use crate::backtest::{BacktestConfig, Evaluator, MomentumEvaluator};
use crate::data::PriceSeries;
use crate::error::AnalysisResult;
use crate::metrics::SummaryMetrics;

/// Momentum result for one SMA window.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub sma_window: usize,
    pub outcome: AnalysisResult<SummaryMetrics>,
}

/// Evaluate momentum for every window in `windows`, in parallel.
///
/// Results come back in the order of `windows`. All other settings are
/// taken from `base`.
pub fn sweep_sma_windows(
    series: &PriceSeries,
    windows: &[usize],
    base: &BacktestConfig,
) -> Vec<SweepResult> {
    let results: Vec<SweepResult> = windows
        .par_iter()
        .map(|&sma_window| {
            let config = BacktestConfig {
                sma_window,
                ..base.clone()
            };
            let outcome = MomentumEvaluator::from_config(&config)
                .evaluate(series)
                .map(|o| o.summary);
            SweepResult { sma_window, outcome }
        })
        .collect();

    info!(
        windows = windows.len(),
        ok = results.iter().filter(|r| r.outcome.is_ok()).count(),
        "SMA sweep finished"
    );
    results
}

/// Successful result with the highest Sharpe ratio. Results whose Sharpe
/// is undefined are skipped.
pub fn best_by_sharpe(results: &[SweepResult]) -> Option<&SweepResult> {
    results
        .iter()
        .filter_map(|r| {
            let sharpe = r.outcome.as_ref().ok()?.sharpe_ratio?;
            Some((r, sharpe))
        })
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|(r, _)| r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::tests::{date, weekday_series};
    use crate::error::AnalysisError;

    fn closes() -> Vec<f64> {
        (0..120)
            .map(|i| 100.0 + i as f64 * 0.3 + 6.0 * (i as f64 / 7.0).sin())
            .collect()
    }

    #[test]
    fn test_sweep_preserves_window_order() {
        let series = weekday_series(date(2024, 1, 1), &closes());
        let windows = [50, 5, 20, 10];
        let results = sweep_sma_windows(&series, &windows, &BacktestConfig::default());

        let order: Vec<_> = results.iter().map(|r| r.sma_window).collect();
        assert_eq!(order, windows.to_vec());
    }

    #[test]
    fn test_sweep_matches_sequential_evaluation() {
        let series = weekday_series(date(2024, 1, 1), &closes());
        let base = BacktestConfig::default();
        let results = sweep_sma_windows(&series, &[10, 30], &base);

        for result in &results {
            let config = BacktestConfig {
                sma_window: result.sma_window,
                ..base.clone()
            };
            let expected = MomentumEvaluator::from_config(&config)
                .evaluate(&series)
                .unwrap()
                .summary;
            assert_eq!(result.outcome.as_ref().unwrap(), &expected);
        }
    }

    #[test]
    fn test_sweep_reports_per_window_errors() {
        let series = weekday_series(date(2024, 1, 1), &closes());
        let results = sweep_sma_windows(&series, &[0, 10], &BacktestConfig::default());

        assert!(matches!(
            results[0].outcome,
            Err(AnalysisError::InsufficientData { .. })
        ));
        assert!(results[1].outcome.is_ok());
    }

    #[test]
    fn test_best_by_sharpe_skips_failures() {
        let series = weekday_series(date(2024, 1, 1), &closes());
        let results = sweep_sma_windows(&series, &[0, 5, 10, 20], &BacktestConfig::default());

        let best = best_by_sharpe(&results).unwrap();
        let best_sharpe = best.outcome.as_ref().unwrap().sharpe_ratio.unwrap();
        for r in results.iter().filter_map(|r| r.outcome.as_ref().ok()) {
            if let Some(s) = r.sharpe_ratio {
                assert!(s <= best_sharpe);
            }
        }
        assert_eq!(best_by_sharpe(&[]), None);
    }
}
