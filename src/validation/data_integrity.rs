//! Data integrity validation for daily price files.
//!
//! Validates:
//! - Schema (required columns present)
//! - Missing values (rows with empty price cells, forward-filled on load)
//! - Date ordering (no duplicate dates)
//! - Price validity (all prices positive and finite)
//! - OHLC consistency (low <= open, close <= high)
//! - Volume validity (non-negative)
//! - Date continuity (no gaps longer than a week)
//! - Return outliers (daily moves beyond 50%, usually unadjusted splits)
//!
//! Unlike `PriceSeries::new`, which stops at the first bad bar, every check
//! runs over the full file so one report lists every problem.

use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::{DataLoader, LoaderError, PriceBar, MAX_EDGE_GAP_DAYS};

/// Daily moves larger than this are flagged as suspicious.
pub const MAX_ABS_DAILY_RETURN: f64 = 0.5;

/// Examples listed per failed check.
const MAX_DETAILS: usize = 5;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }

    /// Pass when `issues` is empty, else fail listing the first few.
    fn from_issues(name: &str, ok_message: &str, what: &str, issues: Vec<String>) -> Self {
        if issues.is_empty() {
            return Self::pass(name, ok_message);
        }
        let mut shown: Vec<String> = issues.iter().take(MAX_DETAILS).cloned().collect();
        if issues.len() > MAX_DETAILS {
            shown.push(format!("... {} more", issues.len() - MAX_DETAILS));
        }
        Self::fail(
            name,
            &format!("{} {}", issues.len(), what),
            Some(shown.join("; ")),
        )
    }
}

/// Complete integrity report for one price file.
#[derive(Debug)]
pub struct DataIntegrityReport {
    pub source: String,
    pub row_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub checks: Vec<CheckResult>,
}

impl DataIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let total = self.checks.len();
        let range = match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => format!("{} to {}", first, last),
            _ => "no dates".to_string(),
        };
        format!(
            "{} ({} rows, {}): {}/{} checks passed",
            self.source, self.row_count, range, passed, total
        )
    }

    /// Fail with the names of every failed check.
    pub fn ensure_passed(&self) -> ValidationResult<()> {
        if self.all_passed() {
            return Ok(());
        }
        let names: Vec<&str> = self
            .failed_checks()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        Err(ValidationError::ValidationFailed(format!(
            "{}: {}",
            self.source,
            names.join(", ")
        )))
    }
}

/// Validator for daily price data.
pub struct DataIntegrityValidator;

impl DataIntegrityValidator {
    /// Load a file and run every check on it.
    ///
    /// A missing column is reported as a failed schema check rather than an
    /// error; other loader failures propagate.
    pub fn validate_file(path: impl AsRef<Path>) -> ValidationResult<DataIntegrityReport> {
        let path = path.as_ref();
        let source = path.display().to_string();

        match DataLoader::new(path).load_raw() {
            Ok(raw) => {
                let mut report = Self::validate_bars(&source, &raw.bars);
                let issues = raw
                    .filled
                    .iter()
                    .map(|d| format!("{} forward-filled", d))
                    .collect();
                report.checks.insert(
                    1,
                    CheckResult::from_issues(
                        "missing_values",
                        "No empty price cells",
                        "rows with empty price cells",
                        issues,
                    ),
                );
                Ok(report)
            }
            Err(LoaderError::MissingColumn(column)) => Ok(DataIntegrityReport {
                source,
                row_count: 0,
                first_date: None,
                last_date: None,
                checks: vec![CheckResult::fail(
                    "schema",
                    "Required column missing",
                    Some(column),
                )],
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Run every check on bars sorted by date.
    pub fn validate_bars(source: &str, bars: &[PriceBar]) -> DataIntegrityReport {
        DataIntegrityReport {
            source: source.to_string(),
            row_count: bars.len(),
            first_date: bars.first().map(|b| b.date),
            last_date: bars.last().map(|b| b.date),
            checks: vec![
                CheckResult::pass("schema", "All required columns present"),
                check_date_order(bars),
                check_price_validity(bars),
                check_ohlc_consistency(bars),
                check_volume(bars),
                check_date_continuity(bars),
                check_return_outliers(bars),
            ],
        }
    }
}

fn check_date_order(bars: &[PriceBar]) -> CheckResult {
    let issues = bars
        .windows(2)
        .filter(|w| w[1].date <= w[0].date)
        .map(|w| format!("{} repeated", w[1].date))
        .collect();
    CheckResult::from_issues("date_order", "Dates strictly increasing", "duplicate dates", issues)
}

fn check_price_validity(bars: &[PriceBar]) -> CheckResult {
    let issues = bars
        .iter()
        .filter(|b| {
            [b.open, b.high, b.low, b.close]
                .iter()
                .any(|p| !p.is_finite() || *p <= 0.0)
        })
        .map(|b| format!("{} close={}", b.date, b.close))
        .collect();
    CheckResult::from_issues(
        "price_validity",
        "All prices positive",
        "rows with non-positive prices",
        issues,
    )
}

fn check_ohlc_consistency(bars: &[PriceBar]) -> CheckResult {
    let issues = bars
        .iter()
        .filter(|b| {
            let body_low = b.open.min(b.close);
            let body_high = b.open.max(b.close);
            b.low > body_low * (1.0 + 1e-9) || b.high < body_high * (1.0 - 1e-9)
        })
        .map(|b| {
            format!(
                "{} o={} h={} l={} c={}",
                b.date, b.open, b.high, b.low, b.close
            )
        })
        .collect();
    CheckResult::from_issues(
        "ohlc_consistency",
        "low <= open, close <= high on every row",
        "rows with inconsistent OHLC",
        issues,
    )
}

fn check_volume(bars: &[PriceBar]) -> CheckResult {
    let issues = bars
        .iter()
        .filter(|b| b.volume < 0)
        .map(|b| format!("{} volume={}", b.date, b.volume))
        .collect();
    CheckResult::from_issues(
        "volume_validity",
        "All volumes non-negative",
        "rows with negative volume",
        issues,
    )
}

fn check_date_continuity(bars: &[PriceBar]) -> CheckResult {
    let issues: Vec<String> = bars
        .windows(2)
        .filter_map(|w| {
            let gap = (w[1].date - w[0].date).num_days();
            (gap > MAX_EDGE_GAP_DAYS).then(|| format!("{} to {} ({} days)", w[0].date, w[1].date, gap))
        })
        .collect();
    CheckResult::from_issues(
        "date_continuity",
        &format!("{} trading days, no major gaps", bars.len()),
        "major gaps found",
        issues,
    )
}

fn check_return_outliers(bars: &[PriceBar]) -> CheckResult {
    let issues = bars
        .windows(2)
        .filter(|w| w[0].close > 0.0)
        .filter_map(|w| {
            let r = w[1].close / w[0].close - 1.0;
            (r.abs() > MAX_ABS_DAILY_RETURN)
                .then(|| format!("{} {:+.1}%", w[1].date, r * 100.0))
        })
        .collect();
    CheckResult::from_issues(
        "return_outliers",
        "No daily move beyond 50%",
        "suspicious daily moves",
        issues,
    )
}
