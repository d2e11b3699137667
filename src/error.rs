//! Error taxonomy shared by the cleaning, metrics and strategy layers.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Window or series too short for the requested computation.
    #[error("Insufficient data for {context}: expected at least {expected} rows, got {actual}")]
    InsufficientData {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Malformed or internally inconsistent price data.
    #[error("Data integrity violation on {date}: {reason}")]
    DataIntegrity { date: NaiveDate, reason: String },

    /// A contribution date with no matching trading day.
    #[error("Contribution scheduled on {date} has no matching trading day")]
    ScheduleMismatch { date: NaiveDate },

    /// Degenerate statistic. Reported as a `None` sentinel by the metrics layer.
    #[error("Division by zero computing {context}")]
    DivisionByZero { context: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn insufficient(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context: context.into(),
            expected,
            actual,
        }
    }

    pub fn integrity(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            date,
            reason: reason.into(),
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = AnalysisError::insufficient("annualized volatility", 2, 1);
        assert_eq!(
            err.to_string(),
            "Insufficient data for annualized volatility: expected at least 2 rows, got 1"
        );

        let date = NaiveDate::from_ymd_opt(2020, 3, 16).unwrap();
        let err = AnalysisError::integrity(date, "previous close is zero");
        assert!(err.to_string().contains("2020-03-16"));

        let err = AnalysisError::ScheduleMismatch { date };
        assert!(err.to_string().contains("2020-03-16"));
    }
}
