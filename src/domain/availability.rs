//! Year-over-year availability classification.
//!
//! A ticker is available in a year when its observation has a positive price
//! and, unless it is an index instrument, a positive market cap. Each year is
//! then compared with the previous one to split tickers into entering,
//! exiting and continuing sets.

use std::collections::{BTreeSet, HashMap};

use super::observation::FetchOutcome;
use super::stock::{InstrumentKind, Stock};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct YearAvailability {
    pub year: i32,
    pub available: BTreeSet<String>,
    /// Available this year, not the previous processed year.
    pub entering: BTreeSet<String>,
    /// Available the previous processed year, not this year.
    pub exiting: BTreeSet<String>,
    pub continuing: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityReport {
    pub tickers: Vec<String>,
    pub years: Vec<YearAvailability>,
    /// Set when the analysis stopped early; `years` then covers a prefix only.
    pub cancelled: bool,
}

impl AvailabilityReport {
    pub fn year(&self, year: i32) -> Option<&YearAvailability> {
        self.years.iter().find(|y| y.year == year)
    }

    /// Tickers never available in any analyzed year.
    pub fn never_available(&self) -> Vec<String> {
        self.tickers
            .iter()
            .filter(|t| !self.years.iter().any(|y| y.available.contains(*t)))
            .cloned()
            .collect()
    }
}

/// Tickers with valid data among one year's fetch outcomes.
///
/// Tickers missing from `kinds` are treated as equities.
pub fn available_tickers<'a>(
    kinds: &HashMap<String, InstrumentKind>,
    outcomes: impl IntoIterator<Item = (&'a String, &'a FetchOutcome)>,
) -> BTreeSet<String> {
    outcomes
        .into_iter()
        .filter_map(|(ticker, outcome)| {
            let obs = outcome.found()?;
            let is_index = kinds.get(ticker) == Some(&InstrumentKind::Index);
            obs.is_valid(is_index).then(|| ticker.clone())
        })
        .collect()
}

pub fn kind_lookup(stocks: &[Stock]) -> HashMap<String, InstrumentKind> {
    stocks.iter().map(|s| (s.ticker.clone(), s.kind)).collect()
}

/// Classify each year against the previous one. Input is sorted by year
/// first; the first year has no predecessor, so everything in it is entering.
pub fn classify(mut per_year: Vec<(i32, BTreeSet<String>)>) -> Vec<YearAvailability> {
    per_year.sort_by_key(|(year, _)| *year);

    let mut previous: BTreeSet<String> = BTreeSet::new();
    let mut result = Vec::with_capacity(per_year.len());

    for (year, available) in per_year {
        let entering = available.difference(&previous).cloned().collect();
        let exiting = previous.difference(&available).cloned().collect();
        let continuing = available.intersection(&previous).cloned().collect();
        result.push(YearAvailability {
            year,
            available: available.clone(),
            entering,
            exiting,
            continuing,
        });
        previous = available;
    }

    result
}
