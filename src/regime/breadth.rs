//! Basket breadth regime filter.
//!
//! Counts how many members of a basket close above their own long moving
//! average on each date. The market is "risk-on" when at least
//! `min_above` members are above.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::simple_moving_average;
use crate::data::PriceSeries;

/// Breadth filter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadthFilterConfig {
    /// Moving-average lookback per member (trading days).
    pub ma_window: usize,
    /// Members that must be above their average for risk-on.
    pub min_above: usize,
}

impl Default for BreadthFilterConfig {
    fn default() -> Self {
        Self {
            ma_window: 200,
            min_above: 3,
        }
    }
}

/// Per-date risk-on flags. Dates without an entry are risk-off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskOnSignal {
    flags: BTreeMap<NaiveDate, bool>,
}

impl RiskOnSignal {
    pub fn from_dates(flags: impl IntoIterator<Item = (NaiveDate, bool)>) -> Self {
        Self {
            flags: flags.into_iter().collect(),
        }
    }

    pub fn is_risk_on(&self, date: NaiveDate) -> bool {
        self.flags.get(&date).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Share of dates flagged risk-on.
    pub fn risk_on_fraction(&self) -> f64 {
        if self.flags.is_empty() {
            return 0.0;
        }
        self.flags.values().filter(|on| **on).count() as f64 / self.flags.len() as f64
    }
}

/// Basket breadth regime filter.
pub struct BreadthFilter {
    config: BreadthFilterConfig,
}

impl BreadthFilter {
    pub fn new(config: BreadthFilterConfig) -> Self {
        Self { config }
    }

    /// Dates on which each member closes above its own moving average.
    fn above_dates(&self, series: &PriceSeries) -> BTreeSet<NaiveDate> {
        let sma = simple_moving_average(&series.closes(), self.config.ma_window);
        series
            .bars()
            .iter()
            .zip(sma)
            .filter(|(bar, avg)| avg.is_some_and(|avg| bar.close > avg))
            .map(|(bar, _)| bar.date)
            .collect()
    }

    /// Build the signal over the union of all member dates.
    ///
    /// A member with no bar on a date, or no full average yet, counts as
    /// not above.
    pub fn build(&self, basket: &[&PriceSeries]) -> RiskOnSignal {
        let above: Vec<BTreeSet<NaiveDate>> = basket.iter().map(|s| self.above_dates(s)).collect();
        let all_dates: BTreeSet<NaiveDate> = basket.iter().flat_map(|s| s.dates()).collect();

        let signal = RiskOnSignal::from_dates(all_dates.into_iter().map(|date| {
            let count = above.iter().filter(|set| set.contains(&date)).count();
            (date, count >= self.config.min_above)
        }));

        debug!(
            members = basket.len(),
            dates = signal.len(),
            risk_on = signal.risk_on_fraction(),
            "Built breadth signal"
        );
        signal
    }
}

impl Default for BreadthFilter {
    fn default() -> Self {
        Self::new(BreadthFilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::tests::{date, weekday_series};

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 10.0 + i as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 - i as f64).collect()
    }

    fn config() -> BreadthFilterConfig {
        BreadthFilterConfig {
            ma_window: 3,
            min_above: 2,
        }
    }

    #[test]
    fn test_default_config() {
        let config = BreadthFilterConfig::default();
        assert_eq!(config.ma_window, 200);
        assert_eq!(config.min_above, 3);
    }

    #[test]
    fn test_majority_above_is_risk_on() {
        let start = date(2024, 1, 1);
        let a = weekday_series(start, &rising(10));
        let b = weekday_series(start, &rising(10));
        let c = weekday_series(start, &falling(10));

        let signal = BreadthFilter::new(config()).build(&[&a, &b, &c]);

        // Warm-up days have no average: risk-off.
        assert!(!signal.is_risk_on(date(2024, 1, 1)));
        assert!(!signal.is_risk_on(date(2024, 1, 2)));
        // Two of three rising members above their average.
        assert!(signal.is_risk_on(date(2024, 1, 3)));
        assert!(signal.is_risk_on(date(2024, 1, 12)));
        // Unknown date.
        assert!(!signal.is_risk_on(date(2030, 1, 1)));
    }

    #[test]
    fn test_minority_above_is_risk_off() {
        let start = date(2024, 1, 1);
        let a = weekday_series(start, &rising(10));
        let b = weekday_series(start, &falling(10));
        let c = weekday_series(start, &falling(10));

        let signal = BreadthFilter::new(config()).build(&[&a, &b, &c]);
        assert_eq!(signal.risk_on_fraction(), 0.0);
        assert_eq!(signal.len(), 10);
    }

    #[test]
    fn test_missing_member_bars_count_as_below() {
        let a = weekday_series(date(2024, 1, 1), &rising(10));
        // Second member only starts a week later.
        let b = weekday_series(date(2024, 1, 8), &rising(5));

        let signal = BreadthFilter::new(config()).build(&[&a, &b]);
        assert!(!signal.is_risk_on(date(2024, 1, 5)));
        assert!(signal.is_risk_on(date(2024, 1, 10)));
    }
}
