//! Per-year universe: the eligible stocks on a valuation date and whatever
//! observations were fetched for them.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

use super::observation::Observation;
use super::stock::Stock;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parse a comma separated ticker list, uppercasing and rejecting duplicates.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Why a year produced no snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The universe collaborator could not list eligible stocks.
    UniverseUnavailable(String),
    /// Fetches kept failing after retries; the year is not applied so an
    /// outage is never mistaken for delistings.
    FetchFailed { tickers: Vec<String> },
    /// No eligible ticker had a priced observation.
    NoPricedObservations,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UniverseUnavailable(reason) => {
                write!(f, "universe unavailable ({reason})")
            }
            SkipReason::FetchFailed { tickers } => {
                write!(f, "fetch failed for {}", tickers.join(", "))
            }
            SkipReason::NoPricedObservations => write!(f, "no priced observations"),
        }
    }
}

/// Everything an engine needs to process one year.
#[derive(Debug, Clone)]
pub struct YearUniverse {
    pub year: i32,
    pub date: NaiveDate,
    /// Stocks eligible on `date`, sorted by ticker.
    pub stocks: Vec<Stock>,
    /// Found observations for eligible and currently held tickers.
    pub observations: BTreeMap<String, Observation>,
}

impl YearUniverse {
    pub fn new(
        year: i32,
        date: NaiveDate,
        mut stocks: Vec<Stock>,
        observations: impl IntoIterator<Item = Observation>,
    ) -> Self {
        stocks.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        stocks.dedup_by(|a, b| a.ticker == b.ticker);
        YearUniverse {
            year,
            date,
            stocks,
            observations: observations
                .into_iter()
                .map(|o| (o.ticker.clone(), o))
                .collect(),
        }
    }

    /// Priced observation for `ticker`, if any.
    pub fn priced(&self, ticker: &str) -> Option<&Observation> {
        self.observations.get(ticker).filter(|o| o.is_priced())
    }

    /// Eligible equities that have a priced observation, in ticker order.
    /// Index instruments are tracked for availability only and never bought.
    pub fn priced_universe(&self) -> Vec<&Observation> {
        self.stocks
            .iter()
            .filter(|s| !s.is_index())
            .filter_map(|s| self.priced(&s.ticker))
            .collect()
    }

    pub fn max_price(&self) -> f64 {
        self.observations
            .values()
            .map(|o| o.adjusted_price)
            .fold(0.0, f64::max)
    }
}
