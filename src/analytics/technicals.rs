//! Per-day technical columns for a price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::PriceSeries;

use super::moving_average::simple_moving_average;

pub const SHORT_MA: usize = 50;
pub const LONG_MA: usize = 200;

/// Close, moving averages and returns for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalRow {
    pub date: NaiveDate,
    pub close: f64,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
    pub daily_return: Option<f64>,
    pub log_return: Option<f64>,
}

/// Compute technical columns with the given short and long MA windows.
pub fn technical_rows(series: &PriceSeries, short: usize, long: usize) -> Vec<TechnicalRow> {
    let closes = series.closes();
    let ma_short = simple_moving_average(&closes, short);
    let ma_long = simple_moving_average(&closes, long);

    series
        .bars()
        .iter()
        .enumerate()
        .map(|(idx, bar)| {
            let prev = idx.checked_sub(1).map(|p| closes[p]);
            TechnicalRow {
                date: bar.date,
                close: bar.close,
                ma_short: ma_short[idx],
                ma_long: ma_long[idx],
                daily_return: prev.map(|p| bar.close / p - 1.0),
                log_return: prev.map(|p| (bar.close / p).ln()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::tests::{date, weekday_series};

    #[test]
    fn test_technical_rows() {
        let series = weekday_series(date(2024, 1, 1), &[10.0, 11.0, 12.1]);
        let rows = technical_rows(&series, 2, 3);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].daily_return, None);
        assert_eq!(rows[0].ma_short, None);
        assert_eq!(rows[1].ma_short, Some(10.5));
        assert_eq!(rows[1].ma_long, None);
        assert!((rows[2].ma_long.unwrap() - 11.0333333).abs() < 1e-6);
        assert!((rows[2].daily_return.unwrap() - 0.1).abs() < 1e-9);
        assert!((rows[2].log_return.unwrap() - 1.1_f64.ln()).abs() < 1e-9);
    }
}
