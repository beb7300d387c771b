//! Market data port traits.

use crate::domain::error::WeightbenchError;
use crate::domain::observation::FetchOutcome;
use crate::domain::stock::Stock;
use chrono::NaiveDate;

/// Adapters answer a (ticker, date) query with the first observation on or
/// after `date`, looking at most this many days ahead.
pub const OBSERVATION_LOOKAHEAD_DAYS: i64 = 7;

/// Price and market-cap lookups. Must be idempotent: the same query may be
/// repeated and cached.
pub trait ObservationPort: Send + Sync {
    fn fetch_observation(&self, ticker: &str, date: NaiveDate) -> FetchOutcome;
}

/// Universe membership.
pub trait UniversePort: Send + Sync {
    /// Every stock the universe knows about, eligible or not.
    fn list_stocks(&self) -> Result<Vec<Stock>, WeightbenchError>;

    fn list_eligible_stocks(&self, date: NaiveDate) -> Result<Vec<Stock>, WeightbenchError> {
        Ok(self
            .list_stocks()?
            .into_iter()
            .filter(|s| s.is_eligible_on(date))
            .collect())
    }
}

/// A data source that serves both ports.
pub trait MarketDataPort: ObservationPort + UniversePort {}

impl<T: ObservationPort + UniversePort + ?Sized> MarketDataPort for T {}

impl<T: ObservationPort + ?Sized> ObservationPort for Box<T> {
    fn fetch_observation(&self, ticker: &str, date: NaiveDate) -> FetchOutcome {
        (**self).fetch_observation(ticker, date)
    }
}

impl<T: UniversePort + ?Sized> UniversePort for Box<T> {
    fn list_stocks(&self) -> Result<Vec<Stock>, WeightbenchError> {
        (**self).list_stocks()
    }

    fn list_eligible_stocks(&self, date: NaiveDate) -> Result<Vec<Stock>, WeightbenchError> {
        (**self).list_eligible_stocks(date)
    }
}

impl<T: ObservationPort + ?Sized> ObservationPort for &T {
    fn fetch_observation(&self, ticker: &str, date: NaiveDate) -> FetchOutcome {
        (**self).fetch_observation(ticker, date)
    }
}

impl<T: UniversePort + ?Sized> UniversePort for &T {
    fn list_stocks(&self) -> Result<Vec<Stock>, WeightbenchError> {
        (**self).list_stocks()
    }

    fn list_eligible_stocks(&self, date: NaiveDate) -> Result<Vec<Stock>, WeightbenchError> {
        (**self).list_eligible_stocks(date)
    }
}
