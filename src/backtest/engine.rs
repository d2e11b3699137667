//! Shared evaluator contract and the pipeline that runs every strategy.
//!
//! Runs the analysis:
//! 1. Restrict the raw series to the configured window and forward-fill
//! 2. Build the monthly contribution schedule
//! 3. Evaluate DCA, buy-and-hold and momentum independently
//!
//! A failing strategy is reported on its own; it never aborts the others.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{CleanedSeries, Cleaner, DateWindow, GapFill, PriceSeries};
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::SummaryMetrics;

use super::buy_hold::BuyAndHoldEvaluator;
use super::dca::DcaEvaluator;
use super::momentum::{ExecutionTiming, MomentumEvaluator};
use super::schedule::{CashFlowSchedule, ContributionAnchor};

/// Configuration for an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// First date of the analysis window (inclusive).
    pub start_date: NaiveDate,

    /// Last date of the analysis window (inclusive).
    pub end_date: NaiveDate,

    /// Buy-and-hold and momentum starting cash.
    pub initial_capital: Decimal,

    /// DCA amount invested each month.
    pub monthly_contribution: Decimal,

    /// Trading day of the month that receives the DCA contribution.
    pub contribution_anchor: ContributionAnchor,

    /// Momentum moving-average lookback in trading days.
    pub sma_window: usize,

    /// Annual risk-free rate used as the Sharpe baseline.
    pub risk_free_rate: f64,

    /// When a momentum signal is acted on.
    pub execution: ExecutionTiming,

    /// Gap handling inside the window.
    pub gap_fill: GapFill,

    /// Fail when the data does not reach both edges of the window.
    pub require_coverage: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            initial_capital: Decimal::from(100_000),
            monthly_contribution: Decimal::from(1_000),
            contribution_anchor: ContributionAnchor::MonthEnd,
            sma_window: 50,
            risk_free_rate: 0.0,
            execution: ExecutionTiming::SameDay,
            gap_fill: GapFill::Disabled,
            require_coverage: true,
        }
    }
}

impl BacktestConfig {
    /// Load a TOML config file. Missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AnalysisError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AnalysisResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        DateWindow::new(self.start_date, self.end_date)?;
        if self.initial_capital <= Decimal::ZERO {
            return Err(AnalysisError::Config(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.monthly_contribution <= Decimal::ZERO {
            return Err(AnalysisError::Config(format!(
                "monthly_contribution must be positive, got {}",
                self.monthly_contribution
            )));
        }
        if self.sma_window == 0 {
            return Err(AnalysisError::Config("sma_window must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn window(&self) -> AnalysisResult<DateWindow> {
        DateWindow::new(self.start_date, self.end_date)
    }

    pub fn cleaner(&self) -> Cleaner {
        Cleaner::new(self.gap_fill, self.require_coverage)
    }
}

/// Daily equity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    /// Cumulative cash contributed up to and including this date.
    pub invested: Decimal,
}

/// Portfolio value over time, one point per trading day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new(points: Vec<EquityPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&EquityPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    pub fn final_equity(&self) -> f64 {
        self.points.last().map(|p| p.equity).unwrap_or(0.0)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.equity).collect()
    }

    /// Day-over-day equity returns. Days whose previous equity is zero
    /// (nothing invested yet) are skipped.
    pub fn implied_returns(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .filter(|w| w[0].equity > 0.0)
            .map(|w| w[1].equity / w[0].equity - 1.0)
            .collect()
    }
}

/// Output of one strategy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub equity_curve: EquityCurve,
    pub summary: SummaryMetrics,
}

/// A deterministic strategy simulation over a cleaned price series.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, series: &PriceSeries) -> AnalysisResult<StrategyOutcome>;
}

/// Per-strategy result of a full run.
#[derive(Debug)]
pub struct StrategyReport {
    pub strategy: String,
    pub outcome: AnalysisResult<StrategyOutcome>,
}

/// Runs every configured strategy over one price file.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Window and forward-fill a raw series.
    pub fn prepare(&self, raw: &PriceSeries) -> AnalysisResult<CleanedSeries> {
        self.config.cleaner().clean(raw, self.config.window()?)
    }

    /// Window and clean each member of a breadth basket the same way as the
    /// traded series, so moving averages start inside the window.
    pub fn prepare_basket(&self, basket: &[PriceSeries]) -> AnalysisResult<Vec<PriceSeries>> {
        basket
            .iter()
            .map(|raw| self.prepare(raw).map(|cleaned| cleaned.series))
            .collect()
    }

    /// Build the three evaluators for a cleaned series.
    pub fn evaluators(&self, series: &PriceSeries) -> AnalysisResult<Vec<Box<dyn Evaluator>>> {
        let schedule = CashFlowSchedule::monthly(
            series,
            self.config.monthly_contribution,
            self.config.contribution_anchor,
        )?;

        Ok(vec![
            Box::new(DcaEvaluator::new(schedule, self.config.risk_free_rate)),
            Box::new(BuyAndHoldEvaluator::new(
                self.config.initial_capital,
                self.config.risk_free_rate,
            )),
            Box::new(MomentumEvaluator::from_config(&self.config)),
        ])
    }

    /// Evaluate every strategy on an already cleaned series.
    pub fn run_with_data(&self, series: &PriceSeries) -> AnalysisResult<Vec<StrategyReport>> {
        let reports = self
            .evaluators(series)?
            .iter()
            .map(|evaluator| {
                let outcome = evaluator.evaluate(series);
                match &outcome {
                    Ok(o) => info!(
                        strategy = evaluator.name(),
                        final_value = o.summary.final_value,
                        "Strategy evaluated"
                    ),
                    Err(e) => warn!(strategy = evaluator.name(), error = %e, "Strategy failed"),
                }
                StrategyReport {
                    strategy: evaluator.name().to_string(),
                    outcome,
                }
            })
            .collect();
        Ok(reports)
    }

    /// Clean a raw series, then evaluate every strategy.
    pub fn run(&self, raw: &PriceSeries) -> AnalysisResult<Vec<StrategyReport>> {
        let cleaned = self.prepare(raw)?;
        self.run_with_data(&cleaned.series)
    }
}

/// Clean `raw` with `config` and evaluate every strategy.
pub fn run_all(raw: &PriceSeries, config: &BacktestConfig) -> AnalysisResult<Vec<StrategyReport>> {
    BacktestEngine::new(config.clone())?.run(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::tests::{date, weekday_series};

    fn config_for(series: &PriceSeries) -> BacktestConfig {
        BacktestConfig {
            start_date: series.first().unwrap().date,
            end_date: series.last().unwrap().date,
            sma_window: 5,
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = BacktestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sma_window, 50);
        assert_eq!(config.risk_free_rate, 0.0);
        assert_eq!(config.gap_fill, GapFill::Disabled);
    }

    #[test]
    fn test_config_from_toml_with_defaults() {
        let config = BacktestConfig::from_toml_str(
            r#"
            start_date = "2016-01-01"
            end_date = "2020-12-31"
            monthly_contribution = 500
            sma_window = 20
            execution = "next_day"
            contribution_anchor = "month_start"
            "#,
        )
        .unwrap();

        assert_eq!(config.start_date, date(2016, 1, 1));
        assert_eq!(config.monthly_contribution, Decimal::from(500));
        assert_eq!(config.sma_window, 20);
        assert_eq!(config.execution, ExecutionTiming::NextDay);
        assert_eq!(config.contribution_anchor, ContributionAnchor::MonthStart);
        assert_eq!(config.initial_capital, Decimal::from(100_000));
        assert!(config.require_coverage);
    }

    #[test]
    fn test_config_rejects_zero_window() {
        let err = BacktestConfig::from_toml_str("sma_window = 0").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn test_implied_returns_skip_empty_days() {
        let curve = EquityCurve::new(
            [0.0, 0.0, 100.0, 110.0]
                .iter()
                .enumerate()
                .map(|(i, &equity)| EquityPoint {
                    date: date(2024, 1, 1) + chrono::Duration::days(i as i64),
                    equity,
                    invested: Decimal::ZERO,
                })
                .collect(),
        );
        let returns = curve.implied_returns();
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_run_reports_every_strategy() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64).collect();
        let series = weekday_series(date(2024, 1, 1), &closes);
        let reports = run_all(&series, &config_for(&series)).unwrap();

        let names: Vec<_> = reports.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(names, vec!["DCA", "Buy & Hold", "Momentum"]);
        assert!(reports.iter().all(|r| r.outcome.is_ok()));
    }

    #[test]
    fn test_failing_strategy_does_not_abort_others() {
        // Two bars: too short for volatility, so buy-and-hold and momentum
        // fail while DCA still reports.
        let series = weekday_series(date(2024, 1, 1), &[100.0, 101.0]);
        let reports = run_all(&series, &config_for(&series)).unwrap();

        assert!(reports[0].outcome.is_ok());
        assert!(matches!(
            reports[1].outcome,
            Err(AnalysisError::InsufficientData { .. })
        ));
        assert!(reports[2].outcome.is_err());
    }

    #[test]
    fn test_engine_is_deterministic() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + ((i * 7) % 11) as f64).collect();
        let series = weekday_series(date(2023, 3, 1), &closes);
        let engine = BacktestEngine::new(config_for(&series)).unwrap();

        let first = engine.run(&series).unwrap();
        let second = engine.run(&series).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.outcome, b.outcome);
        }
    }

    fn assert_close(label: &str, actual: Option<f64>, expected: f64, tolerance: f64) {
        let actual = actual.unwrap_or(f64::NAN);
        assert!(
            (actual - expected).abs() <= tolerance,
            "{}: {} vs {}",
            label,
            actual,
            expected
        );
    }

    /// Regression against the QQQ 2015-2024 reference file, on the file's
    /// own trading calendar. Run with
    /// `ETF_BACKTEST_QQQ_CSV=path/to/QQQ.csv cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn test_qqq_reference_figures() {
        let path = std::env::var("ETF_BACKTEST_QQQ_CSV")
            .expect("ETF_BACKTEST_QQQ_CSV must point at the QQQ reference file");
        let raw = crate::data::DataLoader::new(path).load().unwrap();
        let config = BacktestConfig {
            execution: ExecutionTiming::NextDay,
            require_coverage: false,
            ..BacktestConfig::default()
        };
        let reports = run_all(&raw, &config).unwrap();
        let summary = |i: usize| reports[i].outcome.as_ref().unwrap().summary.clone();

        let dca = summary(0);
        assert_eq!(dca.total_cost, Some(Decimal::from(108_000)));
        assert_eq!(dca.contributions, Some(108));
        assert_close("dca final", Some(dca.final_value), 253_991.35, 1.0);
        assert_close("dca shares", dca.shares_held, 626.26, 0.01);

        let hold = summary(1);
        assert_close("hold drawdown", hold.max_drawdown, -0.3512, 0.0001);
        assert_close("hold volatility", hold.annualized_volatility, 0.2221, 0.0001);
        assert_close("hold sharpe", hold.sharpe_ratio, 0.84, 0.005);

        let momentum = summary(2);
        assert_close("momentum final", Some(momentum.final_value), 240_712.71, 1.0);
        assert_close("momentum drawdown", momentum.max_drawdown, -0.1887, 0.0001);
        assert_close("momentum volatility", momentum.annualized_volatility, 0.1374, 0.0001);
        assert_close("momentum sharpe", momentum.sharpe_ratio, 0.78, 0.005);
    }

    #[test]
    fn test_basket_is_clipped_to_window() {
        use crate::regime::{BreadthFilter, BreadthFilterConfig};

        // Rising history before the window would give the basket a full
        // moving average on the first windowed day.
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let member = weekday_series(date(2024, 1, 1), &closes);
        let window_start = member.bars()[10].date;
        let engine = BacktestEngine::new(BacktestConfig {
            start_date: window_start,
            end_date: member.last().unwrap().date,
            ..BacktestConfig::default()
        })
        .unwrap();

        let clipped = engine.prepare_basket(&[member.clone()]).unwrap();
        assert_eq!(clipped[0].first().unwrap().date, window_start);

        let filter = BreadthFilter::new(BreadthFilterConfig {
            ma_window: 3,
            min_above: 1,
        });
        let refs: Vec<&PriceSeries> = clipped.iter().collect();
        let signal = filter.build(&refs);
        assert!(!signal.is_risk_on(window_start));
        assert!(!signal.is_risk_on(clipped[0].bars()[1].date));
        assert!(signal.is_risk_on(clipped[0].bars()[2].date));
        assert!(filter.build(&[&member]).is_risk_on(window_start));
    }
}
