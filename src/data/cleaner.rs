//! Window restriction and forward-filling of daily price series.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};

use super::types::{DateWindow, PriceBar, PriceSeries};

/// Largest gap (calendar days) tolerated between a window edge and the
/// nearest bar before the window counts as uncovered. Spans a long weekend
/// plus a holiday.
pub const MAX_EDGE_GAP_DAYS: i64 = 7;

/// How dates without a row inside the window are handled.
///
/// Rows present with empty price cells are forward-filled by the loader
/// either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFill {
    /// Synthesize a carried-forward bar for every missing weekday. Exchange
    /// holidays become zero-return bars.
    Weekdays,
    /// Keep the file's own trading calendar.
    #[default]
    Disabled,
}

/// Result of cleaning a raw series.
#[derive(Debug, Clone)]
pub struct CleanedSeries {
    pub series: PriceSeries,
    /// Dates that were synthesized by forward-fill.
    pub filled: Vec<NaiveDate>,
    /// Raw bars dropped for falling outside the window.
    pub dropped: usize,
}

/// Restricts a raw series to a window and optionally fills weekday gaps.
#[derive(Debug, Clone, Copy)]
pub struct Cleaner {
    pub gap_fill: GapFill,
    pub require_coverage: bool,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self {
            gap_fill: GapFill::Disabled,
            require_coverage: true,
        }
    }
}

impl Cleaner {
    pub fn new(gap_fill: GapFill, require_coverage: bool) -> Self {
        Self {
            gap_fill,
            require_coverage,
        }
    }

    pub fn clean(&self, raw: &PriceSeries, window: DateWindow) -> AnalysisResult<CleanedSeries> {
        let in_window: Vec<&PriceBar> = raw
            .bars()
            .iter()
            .filter(|b| window.contains(b.date))
            .collect();
        let dropped = raw.len() - in_window.len();

        let (first, last) = match (in_window.first(), in_window.last()) {
            (Some(first), Some(last)) => (first.date, last.date),
            _ => {
                return Err(AnalysisError::insufficient(
                    format!("window {} to {}", window.start, window.end),
                    1,
                    0,
                ))
            }
        };

        if self.require_coverage {
            check_coverage(window, first, last, in_window.len())?;
        }

        let mut bars = Vec::with_capacity(in_window.len());
        let mut filled = Vec::new();

        for bar in in_window {
            let prev = bars.last().map(|p: &PriceBar| (p.date, p.close));
            if let (GapFill::Weekdays, Some((prev_date, carry))) = (self.gap_fill, prev) {
                let mut day = next_weekday(prev_date);
                while day < bar.date {
                    bars.push(PriceBar::carried_forward(day, carry));
                    filled.push(day);
                    day = next_weekday(day);
                }
            }
            bars.push(bar.clone());
        }

        if !filled.is_empty() {
            warn!(
                filled = filled.len(),
                first_filled = %filled[0],
                "Forward-filled missing weekdays"
            );
        }
        debug!(
            kept = bars.len(),
            dropped,
            start = %window.start,
            end = %window.end,
            "Cleaned price series"
        );

        Ok(CleanedSeries {
            series: PriceSeries::new(bars)?,
            filled,
            dropped,
        })
    }
}

fn check_coverage(
    window: DateWindow,
    first: NaiveDate,
    last: NaiveDate,
    rows: usize,
) -> AnalysisResult<()> {
    let lead = (first - window.start).num_days();
    let trail = (window.end - last).num_days();
    if lead > MAX_EDGE_GAP_DAYS || trail > MAX_EDGE_GAP_DAYS {
        return Err(AnalysisError::insufficient(
            format!(
                "window {} to {} (data covers {} to {})",
                window.start, window.end, first, last
            ),
            weekdays_between(window.start, window.end),
            rows,
        ));
    }
    Ok(())
}

/// Next Monday-to-Friday date after `date`.
pub fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

/// Number of weekdays in `[start, end]`.
pub fn weekdays_between(start: NaiveDate, end: NaiveDate) -> usize {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::tests::date;

    fn bar(d: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date: d,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 500,
        }
    }

    fn lenient() -> Cleaner {
        Cleaner::new(GapFill::Weekdays, false)
    }

    #[test]
    fn test_next_weekday() {
        // Friday -> Monday
        assert_eq!(next_weekday(date(2024, 1, 5)), date(2024, 1, 8));
        // Monday -> Tuesday
        assert_eq!(next_weekday(date(2024, 1, 8)), date(2024, 1, 9));
    }

    #[test]
    fn test_filters_to_inclusive_window() {
        let raw = PriceSeries::new(vec![
            bar(date(2024, 1, 2), 10.0),
            bar(date(2024, 1, 3), 11.0),
            bar(date(2024, 1, 4), 12.0),
            bar(date(2024, 1, 5), 13.0),
        ])
        .unwrap();
        let window = DateWindow::new(date(2024, 1, 3), date(2024, 1, 4)).unwrap();

        let cleaned = lenient().clean(&raw, window).unwrap();
        assert_eq!(cleaned.series.len(), 2);
        assert_eq!(cleaned.dropped, 2);
        assert_eq!(cleaned.series.first().unwrap().date, date(2024, 1, 3));
        assert_eq!(cleaned.series.last().unwrap().date, date(2024, 1, 4));
    }

    #[test]
    fn test_forward_fill_carries_close_with_zero_volume() {
        // Missing Wednesday and Thursday; weekend is not a gap.
        let raw = PriceSeries::new(vec![
            bar(date(2024, 1, 2), 10.0),
            bar(date(2024, 1, 5), 12.0),
            bar(date(2024, 1, 8), 13.0),
        ])
        .unwrap();
        let window = DateWindow::new(date(2024, 1, 1), date(2024, 1, 10)).unwrap();

        let cleaned = lenient().clean(&raw, window).unwrap();
        assert_eq!(cleaned.filled, vec![date(2024, 1, 3), date(2024, 1, 4)]);
        assert_eq!(cleaned.series.len(), 5);

        for d in &cleaned.filled {
            let filled = cleaned.series.get(*d).unwrap();
            assert_eq!(filled.volume, 0);
            assert_eq!(filled.open, 10.0);
            assert_eq!(filled.high, 10.0);
            assert_eq!(filled.low, 10.0);
            assert_eq!(filled.close, 10.0);
        }

        let returns: Vec<_> = cleaned
            .series
            .returns()
            .collect::<AnalysisResult<Vec<_>>>()
            .unwrap();
        assert_eq!(returns[0].value, 0.0);
        assert_eq!(returns[1].value, 0.0);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let raw = PriceSeries::new(vec![
            bar(date(2024, 1, 2), 10.0),
            bar(date(2024, 1, 9), 12.0),
        ])
        .unwrap();
        let window = DateWindow::new(date(2024, 1, 1), date(2024, 1, 12)).unwrap();

        let once = lenient().clean(&raw, window).unwrap();
        let twice = lenient().clean(&once.series, window).unwrap();
        assert_eq!(once.series, twice.series);
        assert!(twice.filled.is_empty());
    }

    #[test]
    fn test_gap_fill_disabled_keeps_observed_bars() {
        let raw = PriceSeries::new(vec![
            bar(date(2024, 1, 2), 10.0),
            bar(date(2024, 1, 5), 12.0),
        ])
        .unwrap();
        let window = DateWindow::new(date(2024, 1, 1), date(2024, 1, 5)).unwrap();

        let cleaned = Cleaner::new(GapFill::Disabled, true)
            .clean(&raw, window)
            .unwrap();
        assert_eq!(cleaned.series.len(), 2);
        assert!(cleaned.filled.is_empty());
    }

    #[test]
    fn test_empty_window_is_insufficient() {
        let raw = PriceSeries::new(vec![bar(date(2024, 1, 2), 10.0)]).unwrap();
        let window = DateWindow::new(date(2023, 1, 1), date(2023, 12, 31)).unwrap();

        let err = lenient().clean(&raw, window).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_uncovered_window_is_insufficient() {
        let raw = PriceSeries::new(vec![
            bar(date(2024, 1, 2), 10.0),
            bar(date(2024, 1, 3), 11.0),
        ])
        .unwrap();
        let window = DateWindow::new(date(2024, 1, 1), date(2024, 3, 1)).unwrap();

        let err = Cleaner::default().clean(&raw, window).unwrap_err();
        match err {
            AnalysisError::InsufficientData {
                expected, actual, ..
            } => {
                assert_eq!(actual, 2);
                assert_eq!(expected, weekdays_between(window.start, window.end));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_keeps_exchange_holidays_out() {
        // Mon 2024-01-15 is a market holiday, not a missing row.
        let raw = PriceSeries::new(vec![
            bar(date(2024, 1, 12), 10.0),
            bar(date(2024, 1, 16), 11.0),
        ])
        .unwrap();
        let window = DateWindow::new(date(2024, 1, 12), date(2024, 1, 16)).unwrap();

        let cleaned = Cleaner::default().clean(&raw, window).unwrap();
        assert!(cleaned.filled.is_empty());
        assert_eq!(cleaned.series, raw);
        assert_eq!(GapFill::default(), GapFill::Disabled);
    }

    #[test]
    fn test_weekdays_between() {
        // Mon 2024-01-01 .. Sun 2024-01-14
        assert_eq!(weekdays_between(date(2024, 1, 1), date(2024, 1, 14)), 10);
    }
}
