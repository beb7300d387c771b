//! In-memory memoizing wrapper around any observation port.
//!
//! Only `Found` and `NotFound` outcomes are stored. A `FetchError` is
//! returned as is and the next query goes back to the wrapped port.

use crate::domain::error::WeightbenchError;
use crate::domain::observation::FetchOutcome;
use crate::domain::stock::Stock;
use crate::ports::data_port::{ObservationPort, UniversePort};
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct CachedPort<P> {
    inner: P,
    entries: DashMap<(String, NaiveDate), FetchOutcome>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl<P> CachedPort<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl<P: ObservationPort> ObservationPort for CachedPort<P> {
    fn fetch_observation(&self, ticker: &str, date: NaiveDate) -> FetchOutcome {
        let key = (ticker.to_string(), date);
        if let Some(hit) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let outcome = self.inner.fetch_observation(ticker, date);
        if outcome.is_cacheable() {
            self.entries.insert(key, outcome.clone());
        }
        outcome
    }
}

impl<P: UniversePort> UniversePort for CachedPort<P> {
    fn list_stocks(&self) -> Result<Vec<Stock>, WeightbenchError> {
        self.inner.list_stocks()
    }

    fn list_eligible_stocks(&self, date: NaiveDate) -> Result<Vec<Stock>, WeightbenchError> {
        self.inner.list_eligible_stocks(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        calls: AtomicUsize,
        outcome: FetchOutcome,
    }

    impl ObservationPort for Counting {
        fn fetch_observation(&self, _ticker: &str, _date: NaiveDate) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
    }

    #[test]
    fn repeated_query_hits_cache() {
        let cached = CachedPort::new(Counting {
            calls: AtomicUsize::new(0),
            outcome: FetchOutcome::NotFound,
        });
        assert_eq!(cached.fetch_observation("A", date()), FetchOutcome::NotFound);
        assert_eq!(cached.fetch_observation("A", date()), FetchOutcome::NotFound);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cached.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn distinct_dates_are_distinct_entries() {
        let cached = CachedPort::new(Counting {
            calls: AtomicUsize::new(0),
            outcome: FetchOutcome::NotFound,
        });
        cached.fetch_observation("A", date());
        cached.fetch_observation("A", date().succ_opt().unwrap());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fetch_errors_are_not_cached() {
        let cached = CachedPort::new(Counting {
            calls: AtomicUsize::new(0),
            outcome: FetchOutcome::FetchError("timeout".into()),
        });
        assert!(cached.fetch_observation("A", date()).is_error());
        assert!(cached.fetch_observation("A", date()).is_error());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.stats().entries, 0);
    }
}
