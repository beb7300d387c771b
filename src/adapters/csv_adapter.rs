//! CSV directory data adapter.
//!
//! A data directory holds two files:
//!
//! - `stocks.csv`: `ticker,start_date,end_date,kind` (`end_date` empty while
//!   listed, `kind` is `equity` or `index` and defaults to equity)
//! - `observations.csv`: `ticker,date,price,adjusted_price,shares_outstanding,market_cap`
//!   (the last two may be empty)
//!
//! Both are read once when the adapter is opened.

use crate::domain::error::WeightbenchError;
use crate::domain::observation::{FetchOutcome, Observation};
use crate::domain::stock::{InstrumentKind, Stock};
use crate::ports::data_port::{OBSERVATION_LOOKAHEAD_DAYS, ObservationPort, UniversePort};
use chrono::{Duration, NaiveDate};
use csv::StringRecord;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const STOCKS_FILE: &str = "stocks.csv";
pub const OBSERVATIONS_FILE: &str = "observations.csv";

pub struct CsvAdapter {
    stocks: Vec<Stock>,
    observations: HashMap<String, BTreeMap<NaiveDate, Observation>>,
}

impl CsvAdapter {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, WeightbenchError> {
        let dir = dir.as_ref();
        let stocks = open_file(&dir.join(STOCKS_FILE))?;
        let observations = open_file(&dir.join(OBSERVATIONS_FILE))?;
        Self::from_readers(stocks, observations)
    }

    pub fn from_readers<S: Read, O: Read>(stocks: S, observations: O) -> Result<Self, WeightbenchError> {
        let stocks = read_stocks(stocks)?;
        let mut by_ticker: HashMap<String, BTreeMap<NaiveDate, Observation>> = HashMap::new();
        for obs in read_observations(observations)? {
            by_ticker
                .entry(obs.ticker.clone())
                .or_default()
                .insert(obs.date, obs);
        }
        log::debug!(
            "loaded {} stocks and observations for {} tickers",
            stocks.len(),
            by_ticker.len()
        );
        Ok(Self {
            stocks,
            observations: by_ticker,
        })
    }

    pub fn stocks(&self) -> &[Stock] {
        &self.stocks
    }

    /// Every loaded observation, grouped by ticker and ordered by date.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.values().flat_map(|series| series.values())
    }
}

impl ObservationPort for CsvAdapter {
    fn fetch_observation(&self, ticker: &str, date: NaiveDate) -> FetchOutcome {
        let Some(series) = self.observations.get(ticker) else {
            return FetchOutcome::NotFound;
        };
        let Some(last) = date.checked_add_signed(Duration::days(OBSERVATION_LOOKAHEAD_DAYS)) else {
            return FetchOutcome::NotFound;
        };
        match series.range(date..=last).next() {
            Some((_, obs)) => FetchOutcome::Found(obs.clone()),
            None => FetchOutcome::NotFound,
        }
    }
}

impl UniversePort for CsvAdapter {
    fn list_stocks(&self) -> Result<Vec<Stock>, WeightbenchError> {
        Ok(self.stocks.clone())
    }
}

fn open_file(path: &Path) -> Result<File, WeightbenchError> {
    File::open(path).map_err(|e| WeightbenchError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    })
}

fn read_stocks<R: Read>(reader: R) -> Result<Vec<Stock>, WeightbenchError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = headers(&mut rdr)?;
    let ticker = column(&headers, "ticker")?;
    let start = column(&headers, "start_date")?;
    let end = optional_column(&headers, "end_date");
    let kind = optional_column(&headers, "kind");

    let mut stocks = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_error)?;
        let kind = match kind.map(|i| field(&record, i)).filter(|v| !v.is_empty()) {
            Some(value) => InstrumentKind::parse(value).ok_or_else(|| WeightbenchError::Database {
                reason: format!("invalid instrument kind: {value}"),
            })?,
            None => InstrumentKind::Equity,
        };
        stocks.push(Stock {
            ticker: required(&record, ticker, "ticker")?.to_string(),
            start_date: parse_date(required(&record, start, "start_date")?)?,
            end_date: end
                .map(|i| field(&record, i))
                .filter(|v| !v.is_empty())
                .map(parse_date)
                .transpose()?,
            kind,
        });
    }
    Ok(stocks)
}

fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>, WeightbenchError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = headers(&mut rdr)?;
    let ticker = column(&headers, "ticker")?;
    let date = column(&headers, "date")?;
    let price = column(&headers, "price")?;
    let adjusted = optional_column(&headers, "adjusted_price");
    let shares = optional_column(&headers, "shares_outstanding");
    let cap = optional_column(&headers, "market_cap");

    let mut observations = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_error)?;
        let price = parse_f64(required(&record, price, "price")?, "price")?;
        observations.push(Observation {
            ticker: required(&record, ticker, "ticker")?.to_string(),
            date: parse_date(required(&record, date, "date")?)?,
            price,
            adjusted_price: optional_f64(&record, adjusted, "adjusted_price")?.unwrap_or(price),
            shares_outstanding: optional_f64(&record, shares, "shares_outstanding")?,
            market_cap: optional_f64(&record, cap, "market_cap")?,
        });
    }
    Ok(observations)
}

fn headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<StringRecord, WeightbenchError> {
    rdr.headers().cloned().map_err(csv_error)
}

fn column(headers: &StringRecord, name: &str) -> Result<usize, WeightbenchError> {
    optional_column(headers, name).ok_or_else(|| WeightbenchError::Database {
        reason: format!("missing {name} column"),
    })
}

fn optional_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn field(record: &StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("")
}

fn required<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str, WeightbenchError> {
    match field(record, index) {
        "" => Err(WeightbenchError::Database {
            reason: format!("empty {name} value"),
        }),
        value => Ok(value),
    }
}

fn optional_f64(
    record: &StringRecord,
    index: Option<usize>,
    name: &str,
) -> Result<Option<f64>, WeightbenchError> {
    index
        .map(|i| field(record, i))
        .filter(|v| !v.is_empty())
        .map(|v| parse_f64(v, name))
        .transpose()
}

fn parse_f64(value: &str, name: &str) -> Result<f64, WeightbenchError> {
    value.parse().map_err(|e| WeightbenchError::Database {
        reason: format!("invalid {name} value: {e}"),
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, WeightbenchError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| WeightbenchError::Database {
        reason: format!("invalid date format: {e}"),
    })
}

fn csv_error(e: csv::Error) -> WeightbenchError {
    WeightbenchError::Database {
        reason: format!("CSV parse error: {e}"),
    }
}
