//! Contribution schedules for dollar-cost averaging.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::PriceSeries;
use crate::error::{AnalysisError, AnalysisResult};

/// Which trading day of each month receives the contribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionAnchor {
    /// Last trading day of the month.
    #[default]
    MonthEnd,
    /// First trading day of the month.
    MonthStart,
}

/// A single scheduled contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Ordered contributions with strictly increasing dates and positive amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CashFlowSchedule {
    flows: Vec<CashFlow>,
}

impl CashFlowSchedule {
    pub fn new(flows: Vec<CashFlow>) -> AnalysisResult<Self> {
        for flow in &flows {
            if flow.amount <= Decimal::ZERO {
                return Err(AnalysisError::Config(format!(
                    "contribution on {} must be positive, got {}",
                    flow.date, flow.amount
                )));
            }
        }
        for pair in flows.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(AnalysisError::Config(format!(
                    "contribution dates must increase: {} follows {}",
                    pair[1].date, pair[0].date
                )));
            }
        }
        Ok(Self { flows })
    }

    /// One contribution of `amount` per calendar month present in `series`,
    /// placed on the month's first or last trading day.
    pub fn monthly(
        series: &PriceSeries,
        amount: Decimal,
        anchor: ContributionAnchor,
    ) -> AnalysisResult<Self> {
        let mut dates: Vec<NaiveDate> = Vec::new();
        for date in series.dates() {
            let same_month = dates
                .last()
                .is_some_and(|d| d.year() == date.year() && d.month() == date.month());
            match (same_month, anchor) {
                (false, _) => dates.push(date),
                (true, ContributionAnchor::MonthEnd) => {
                    if let Some(last) = dates.last_mut() {
                        *last = date;
                    }
                }
                (true, ContributionAnchor::MonthStart) => {}
            }
        }

        Self::new(
            dates
                .into_iter()
                .map(|date| CashFlow { date, amount })
                .collect(),
        )
    }

    pub fn flows(&self) -> &[CashFlow] {
        &self.flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Exact sum of all scheduled amounts.
    pub fn total(&self) -> Decimal {
        self.flows.iter().map(|f| f.amount).sum()
    }
}
