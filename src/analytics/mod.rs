//! Price analytics module.
//!
//! Provides:
//! - Rolling simple moving averages
//! - Technical columns (moving averages, simple and log returns)
//! - Weekly return correlation across several series

pub mod correlation;
pub mod moving_average;
pub mod technicals;

pub use correlation::{correlation_matrix, weekly_returns, CorrelationMatrix, WeeklyReturn};
pub use moving_average::simple_moving_average;
pub use technicals::{technical_rows, TechnicalRow, LONG_MA, SHORT_MA};
