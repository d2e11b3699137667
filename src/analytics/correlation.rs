//! Weekly return correlation across several price series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::data::PriceSeries;
use crate::error::{AnalysisError, AnalysisResult};

/// Minimum number of common weeks needed for a correlation estimate.
pub const MIN_COMMON_WEEKS: usize = 3;

/// ISO (year, week) key.
pub type WeekKey = (i32, u32);

/// Return from the previous week's last close to this week's last close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeeklyReturn {
    pub week: WeekKey,
    /// Last trading day of the week.
    pub date: NaiveDate,
    pub value: f64,
}

/// Weekly simple returns from the last close of each ISO week.
pub fn weekly_returns(series: &PriceSeries) -> Vec<WeeklyReturn> {
    let mut week_closes: Vec<(WeekKey, NaiveDate, f64)> = Vec::new();
    for bar in series.bars() {
        let iso = bar.date.iso_week();
        let key = (iso.year(), iso.week());
        match week_closes.last_mut() {
            Some(last) if last.0 == key => *last = (key, bar.date, bar.close),
            _ => week_closes.push((key, bar.date, bar.close)),
        }
    }

    week_closes
        .windows(2)
        .map(|w| WeeklyReturn {
            week: w[1].0,
            date: w[1].1,
            value: w[1].2 / w[0].2 - 1.0,
        })
        .collect()
}

/// Pearson correlation matrix over the weeks all series share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// `None` where either series has zero variance.
    pub values: Vec<Vec<Option<f64>>>,
    pub common_weeks: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        self.values[i][j]
    }

    /// Render as an aligned text table.
    pub fn to_table(&self) -> String {
        let width = self.names.iter().map(|n| n.len()).max().unwrap_or(0).max(7);
        let mut out = format!("{:width$}", "", width = width);
        for name in &self.names {
            out.push_str(&format!(" {:>width$}", name, width = width));
        }
        out.push('\n');
        for (name, row) in self.names.iter().zip(&self.values) {
            out.push_str(&format!("{:width$}", name, width = width));
            for value in row {
                match value {
                    Some(v) => out.push_str(&format!(" {:>width$.3}", v, width = width)),
                    None => out.push_str(&format!(" {:>width$}", "n/a", width = width)),
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Correlate the weekly returns of every named series.
///
/// Weeks are inner-joined: only weeks with a return in every series count.
pub fn correlation_matrix(series: &[(&str, &PriceSeries)]) -> AnalysisResult<CorrelationMatrix> {
    let per_series: Vec<BTreeMap<WeekKey, f64>> = series
        .iter()
        .map(|(_, s)| {
            weekly_returns(s)
                .into_iter()
                .map(|r| (r.week, r.value))
                .collect()
        })
        .collect();

    let common: BTreeSet<WeekKey> = match per_series.split_first() {
        Some((first, rest)) => first
            .keys()
            .filter(|k| rest.iter().all(|m| m.contains_key(*k)))
            .copied()
            .collect(),
        None => BTreeSet::new(),
    };

    if common.len() < MIN_COMMON_WEEKS {
        return Err(AnalysisError::insufficient(
            "weekly return correlation",
            MIN_COMMON_WEEKS,
            common.len(),
        ));
    }

    let columns: Vec<Vec<f64>> = per_series
        .iter()
        .map(|m| common.iter().map(|k| m[k]).collect())
        .collect();

    let values = columns
        .iter()
        .map(|x| columns.iter().map(|y| pearson(x, y)).collect())
        .collect();

    Ok(CorrelationMatrix {
        names: series.iter().map(|(name, _)| name.to_string()).collect(),
        values,
        common_weeks: common.len(),
    })
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let sx = x.iter().std_dev();
    let sy = y.iter().std_dev();
    if sx == 0.0 || sy == 0.0 {
        return None;
    }
    Some(x.iter().covariance(y.iter()) / (sx * sy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::tests::{date, weekday_series};

    fn wavy(n: usize, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 10.0 * ((i as f64) / 3.0 + phase).sin())
            .collect()
    }

    #[test]
    fn test_weekly_returns_use_last_close() {
        // Mon 2024-01-01 .. Fri 2024-01-12: two full weeks.
        let closes: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let series = weekday_series(date(2024, 1, 1), &closes);
        let weekly = weekly_returns(&series);

        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].date, date(2024, 1, 12));
        assert!((weekly[0].value - (10.0 / 5.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_identical_series_are_perfectly_correlated() {
        let a = weekday_series(date(2024, 1, 1), &wavy(100, 0.0));
        let b = weekday_series(date(2024, 1, 1), &wavy(100, 1.3));
        let matrix = correlation_matrix(&[("A", &a), ("B", &b), ("A2", &a)]).unwrap();

        assert!((matrix.get("A", "A2").unwrap() - 1.0).abs() < 1e-9);
        assert!((matrix.get("A", "A").unwrap() - 1.0).abs() < 1e-9);
        let ab = matrix.get("A", "B").unwrap();
        assert!((-1.0..=1.0).contains(&ab));
        assert_eq!(matrix.get("A", "B"), matrix.get("B", "A"));
        assert!(matrix.to_table().contains("A2"));
    }

    #[test]
    fn test_flat_series_has_no_correlation() {
        let a = weekday_series(date(2024, 1, 1), &wavy(40, 0.0));
        let flat = weekday_series(date(2024, 1, 1), &[5.0; 40]);
        let matrix = correlation_matrix(&[("A", &a), ("F", &flat)]).unwrap();
        assert_eq!(matrix.get("A", "F"), None);
    }

    #[test]
    fn test_too_few_common_weeks() {
        let a = weekday_series(date(2024, 1, 1), &wavy(10, 0.0));
        let err = correlation_matrix(&[("A", &a)]).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }
}
