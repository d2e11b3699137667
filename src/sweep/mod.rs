//! Parameter sweeps.
//!
//! Evaluates the momentum strategy over a grid of SMA windows. Each window
//! is an independent pure evaluation over the same borrowed series, so the
//! grid runs in parallel.

pub mod optimizer;

pub use optimizer::{best_by_sharpe, sweep_sma_windows, SweepResult};
