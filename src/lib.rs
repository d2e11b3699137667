pub mod analytics;
pub mod backtest;
pub mod data;
pub mod error;
pub mod metrics;
pub mod regime;
pub mod sweep;
pub mod validation;

// Re-export commonly used types
pub use data::{Cleaner, DataLoader, DateWindow, PriceBar, PriceSeries};
pub use error::{AnalysisError, AnalysisResult};
pub use backtest::{
    run_all, BacktestConfig, BacktestEngine, BuyAndHoldEvaluator, DcaEvaluator, Evaluator,
    MomentumEvaluator, StrategyReport,
};
pub use metrics::{MetricsCalculator, SummaryMetrics};
pub use analytics::{correlation_matrix, CorrelationMatrix};
pub use regime::{BreadthFilter, RiskOnSignal};
pub use sweep::{sweep_sma_windows, SweepResult};
pub use validation::DataIntegrityValidator;
