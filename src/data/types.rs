//! Core data types for daily price analysis.
//!
//! A `PriceSeries` is validated once at construction and never mutated
//! afterwards; every downstream stage derives a new value from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// Relative slack allowed when checking `low <= open, close <= high`.
/// Adjusted vendor prices are rounded independently per column.
const PRICE_TOLERANCE: f64 = 1e-9;

/// Inclusive calendar window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> AnalysisResult<Self> {
        if end < start {
            return Err(AnalysisError::Config(format!(
                "window end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Window length in calendar days.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// One trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// A synthetic bar carrying `close` forward with no trading activity.
    pub fn carried_forward(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }

    /// Check the per-bar invariants.
    pub fn check(&self) -> AnalysisResult<()> {
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AnalysisError::integrity(
                    self.date,
                    format!("{} must be positive and finite, got {}", name, value),
                ));
            }
        }

        if self.volume < 0 {
            return Err(AnalysisError::integrity(
                self.date,
                format!("negative volume {}", self.volume),
            ));
        }

        let tol = self.high.abs() * PRICE_TOLERANCE;
        if self.low > self.high + tol {
            return Err(AnalysisError::integrity(
                self.date,
                format!("low {} above high {}", self.low, self.high),
            ));
        }
        for (name, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low - tol || value > self.high + tol {
                return Err(AnalysisError::integrity(
                    self.date,
                    format!(
                        "{} {} outside [low {}, high {}]",
                        name, value, self.low, self.high
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Ordered daily bars with strictly increasing dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate and wrap a sequence of bars.
    ///
    /// Fails with `DataIntegrity` on the first malformed bar or on a date
    /// that does not strictly follow its predecessor.
    pub fn new(bars: Vec<PriceBar>) -> AnalysisResult<Self> {
        for bar in &bars {
            bar.check()?;
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(AnalysisError::integrity(
                    pair[1].date,
                    format!("date does not follow previous bar {}", pair[0].date),
                ));
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Look up a bar by date.
    pub fn get(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.bars
            .binary_search_by(|b| b.date.cmp(&date))
            .ok()
            .map(|idx| &self.bars[idx])
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by(|b| b.date.cmp(&date)).ok()
    }

    /// Daily simple returns, computed lazily in one pass.
    ///
    /// The first bar has no return. A zero previous close is reported as
    /// `DataIntegrity` rather than producing an infinite return.
    pub fn returns(&self) -> impl Iterator<Item = AnalysisResult<DailyReturn>> + '_ {
        self.bars.windows(2).map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            if prev.close == 0.0 {
                return Err(AnalysisError::integrity(
                    curr.date,
                    format!("previous close on {} is zero", prev.date),
                ));
            }
            Ok(DailyReturn {
                date: curr.date,
                value: curr.close / prev.close - 1.0,
            })
        })
    }

    pub fn into_bars(self) -> Vec<PriceBar> {
        self.bars
    }
}

/// Simple return for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub value: f64,
}

/// Collected daily returns of a `PriceSeries`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReturnSeries {
    returns: Vec<DailyReturn>,
}

impl ReturnSeries {
    pub fn from_prices(series: &PriceSeries) -> AnalysisResult<Self> {
        let returns = series.returns().collect::<AnalysisResult<Vec<_>>>()?;
        Ok(Self { returns })
    }

    pub fn as_slice(&self) -> &[DailyReturn] {
        &self.returns
    }

    pub fn values(&self) -> Vec<f64> {
        self.returns.iter().map(|r| r.value).collect()
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}
