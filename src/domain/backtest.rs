//! Run parameters and the per-strategy result record.

use chrono::NaiveDate;
use std::time::Duration;

use super::error::WeightbenchError;
use super::metrics::{Metrics, YearReturn};
use super::portfolio::Snapshot;
use super::universe::SkipReason;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub start_year: i32,
    pub end_year: i32,
    pub initial_investment: f64,
    pub valuation_month: u32,
    pub valuation_day: u32,
    /// Upper bound on concurrent observation fetches within one year.
    pub max_concurrency: usize,
    pub fetch_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            start_year: 2010,
            end_year: 2020,
            initial_investment: 1_000_000.0,
            valuation_month: 1,
            valuation_day: 1,
            max_concurrency: 8,
            fetch_retries: 2,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), WeightbenchError> {
        if !(self.initial_investment.is_finite() && self.initial_investment > 0.0) {
            return Err(WeightbenchError::config_invalid(
                "backtest",
                "initial_investment",
                "initial_investment must be positive",
            ));
        }
        if self.start_year >= self.end_year {
            return Err(WeightbenchError::config_invalid(
                "backtest",
                "start_year",
                "start_year must be before end_year",
            ));
        }
        if self.valuation_date(self.start_year).is_none() {
            return Err(WeightbenchError::config_invalid(
                "backtest",
                "valuation_day",
                format!(
                    "{}-{} is not a valid month/day",
                    self.valuation_month, self.valuation_day
                ),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(WeightbenchError::config_invalid(
                "backtest",
                "max_concurrency",
                "max_concurrency must be at least 1",
            ));
        }
        Ok(())
    }

    /// Valuation date for `year`. Feb 29 falls back to Feb 28 in common years.
    pub fn valuation_date(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.valuation_month, self.valuation_day).or_else(|| {
            (self.valuation_month == 2 && self.valuation_day == 29)
                .then(|| NaiveDate::from_ymd_opt(year, 2, 28))
                .flatten()
        })
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedYear {
    pub year: i32,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    pub name: String,
    pub start_value: f64,
    pub end_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub yearly: Vec<YearReturn>,
    pub snapshots: Vec<Snapshot>,
    pub skipped: Vec<SkippedYear>,
    /// The run stopped early at a year boundary.
    pub cancelled: bool,
}

impl StrategyResult {
    pub fn from_snapshots(
        name: &str,
        initial_investment: f64,
        snapshots: Vec<Snapshot>,
        skipped: Vec<SkippedYear>,
        cancelled: bool,
    ) -> Self {
        let metrics = Metrics::compute(&snapshots, initial_investment);
        StrategyResult {
            name: name.to_string(),
            start_value: metrics.start_value,
            end_value: metrics.end_value,
            total_return: metrics.total_return,
            annualized_return: metrics.annualized_return,
            max_drawdown: metrics.max_drawdown,
            yearly: metrics.yearly,
            snapshots,
            skipped,
            cancelled,
        }
    }

    pub fn snapshot(&self, year: i32) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.year == year)
    }
}
