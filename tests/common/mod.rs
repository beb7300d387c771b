#![allow(dead_code)]

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use weightbench::domain::backtest::RunConfig;
use weightbench::domain::error::WeightbenchError;
pub use weightbench::domain::observation::{FetchOutcome, Observation};
pub use weightbench::domain::stock::{InstrumentKind, Stock};
use weightbench::ports::data_port::{ObservationPort, UniversePort};

/// In-memory market keyed by (ticker, year). Any date in a year resolves to
/// that year's observation.
pub struct MockDataPort {
    pub stocks: Vec<Stock>,
    pub observations: HashMap<(String, i32), Observation>,
    pub errors: HashMap<(String, i32), String>,
    pub fetches: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            stocks: Vec::new(),
            observations: HashMap::new(),
            errors: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_stock(mut self, ticker: &str, listed: i32, delisted: Option<i32>) -> Self {
        self.stocks.push(Stock::equity(
            ticker,
            date(listed, 1, 1),
            delisted.map(|y| date(y, 1, 1)),
        ));
        self
    }

    pub fn with_index(mut self, ticker: &str, listed: i32) -> Self {
        let mut stock = Stock::equity(ticker, date(listed, 1, 1), None);
        stock.kind = InstrumentKind::Index;
        self.stocks.push(stock);
        self
    }

    /// Same price and cap for every year in `years`.
    pub fn with_prices(
        mut self,
        ticker: &str,
        years: std::ops::RangeInclusive<i32>,
        price: f64,
        market_cap: Option<f64>,
    ) -> Self {
        for year in years {
            self = self.with_observation(ticker, year, price, market_cap);
        }
        self
    }

    pub fn with_observation(mut self, ticker: &str, year: i32, price: f64, market_cap: Option<f64>) -> Self {
        self.observations.insert(
            (ticker.to_string(), year),
            make_observation(ticker, date(year, 1, 2), price, market_cap),
        );
        self
    }

    pub fn with_error(mut self, ticker: &str, year: i32, reason: &str) -> Self {
        self.errors.insert((ticker.to_string(), year), reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ObservationPort for MockDataPort {
    fn fetch_observation(&self, ticker: &str, date: NaiveDate) -> FetchOutcome {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let key = (ticker.to_string(), date.year());
        if let Some(reason) = self.errors.get(&key) {
            return FetchOutcome::FetchError(reason.clone());
        }
        match self.observations.get(&key) {
            Some(obs) => FetchOutcome::Found(obs.clone()),
            None => FetchOutcome::NotFound,
        }
    }
}

impl UniversePort for MockDataPort {
    fn list_stocks(&self) -> Result<Vec<Stock>, WeightbenchError> {
        Ok(self.stocks.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_observation(ticker: &str, date: NaiveDate, price: f64, market_cap: Option<f64>) -> Observation {
    Observation {
        ticker: ticker.to_string(),
        date,
        price,
        adjusted_price: price,
        shares_outstanding: None,
        market_cap,
    }
}

pub fn run_config(start_year: i32, end_year: i32, initial_investment: f64) -> RunConfig {
    RunConfig {
        start_year,
        end_year,
        initial_investment,
        max_concurrency: 4,
        fetch_retries: 1,
        retry_delay: Duration::from_millis(1),
        ..RunConfig::default()
    }
}
