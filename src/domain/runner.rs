//! Year-by-year strategy driver.
//!
//! Years are processed strictly in order, each one reducing the previous
//! portfolio state into the next. Within a year the observation fetches fan
//! out over a thread pool bounded by `max_concurrency`.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::NaiveDate;

use super::availability::{AvailabilityReport, available_tickers, classify, kind_lookup};
use super::backtest::{RunConfig, SkippedYear, StrategyResult};
use super::buy_hold;
use super::error::WeightbenchError;
use super::observation::FetchOutcome;
use super::portfolio::PortfolioState;
use super::rebalance;
use super::strategy::{Rebalancing, StrategySpec};
use super::universe::{SkipReason, YearUniverse};
use crate::ports::data_port::{ObservationPort, UniversePort};

/// Cooperative cancellation, checked once per year boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct StrategyRunner<'a> {
    observations: &'a dyn ObservationPort,
    universe: &'a dyn UniversePort,
    config: RunConfig,
    pool: rayon::ThreadPool,
    cancel: CancelFlag,
}

impl<'a> StrategyRunner<'a> {
    /// Validates `config` up front; an invalid configuration never starts a run.
    pub fn new(
        observations: &'a dyn ObservationPort,
        universe: &'a dyn UniversePort,
        config: RunConfig,
    ) -> Result<Self, WeightbenchError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .thread_name(|i| format!("weightbench-fetch-{i}"))
            .build()
            .map_err(|e| WeightbenchError::Io(std::io::Error::other(e)))?;

        Ok(StrategyRunner {
            observations,
            universe,
            config,
            pool,
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run independent strategies concurrently. Each gets its own result, so
    /// one strategy running out of data does not affect the others.
    pub fn run_all(
        &self,
        specs: &[StrategySpec],
    ) -> Vec<(StrategySpec, Result<StrategyResult, WeightbenchError>)> {
        specs
            .par_iter()
            .map(|spec| (spec.clone(), self.run(spec)))
            .collect()
    }

    pub fn run(&self, spec: &StrategySpec) -> Result<StrategyResult, WeightbenchError> {
        info!(
            "{}: running {}-{} with {:.2}",
            spec.name, self.config.start_year, self.config.end_year, self.config.initial_investment
        );

        let mut state = PortfolioState::new(self.config.initial_investment);
        let mut snapshots = Vec::new();
        let mut skipped = Vec::new();
        let mut initialized = false;
        let mut cancelled = false;

        for year in self.config.years() {
            if self.cancel.is_cancelled() {
                info!("{}: cancelled before {}", spec.name, year);
                cancelled = true;
                break;
            }

            let outcome = self.load_year(year, &state.tickers()).and_then(|universe| {
                let outcome = match (spec.rebalancing, initialized) {
                    (Rebalancing::Annual, _) => {
                        rebalance::rebalance_year(&state, &universe, spec.weighting)
                    }
                    (Rebalancing::BuyHold, false) => {
                        buy_hold::initialize(&state, &universe, spec.weighting)
                    }
                    (Rebalancing::BuyHold, true) => buy_hold::advance(&state, &universe),
                };
                outcome.map(|o| (universe.date, o))
            });

            match outcome {
                Ok((date, outcome)) => {
                    debug!(
                        "{}: {} applied {} trades, dropped {}",
                        spec.name,
                        year,
                        outcome.trades.len(),
                        outcome.dropped.len()
                    );
                    state = outcome.state;
                    initialized = true;
                    snapshots.push(state.snapshot(year, date));
                }
                Err(reason) => {
                    warn!("{}: skipping {} ({})", spec.name, year, reason);
                    skipped.push(SkippedYear { year, reason });
                }
            }
        }

        if snapshots.is_empty() && !cancelled {
            return Err(WeightbenchError::ExhaustedData {
                strategy: spec.name.clone(),
                start_year: self.config.start_year,
                end_year: self.config.end_year,
            });
        }

        let result = StrategyResult::from_snapshots(
            &spec.name,
            self.config.initial_investment,
            snapshots,
            skipped,
            cancelled,
        );
        info!(
            "{}: finished with {:.2} (total {:.2}%, annualized {:.2}%)",
            spec.name,
            result.end_value,
            result.total_return * 100.0,
            result.annualized_return * 100.0
        );
        Ok(result)
    }

    /// Eligible stocks for `year` plus observations for the investable ones
    /// and for `held`. Index instruments are listed but never fetched here.
    pub fn load_year(&self, year: i32, held: &[String]) -> Result<YearUniverse, SkipReason> {
        let date = self.valuation_date(year)?;
        let stocks = self
            .universe
            .list_eligible_stocks(date)
            .map_err(|e| SkipReason::UniverseUnavailable(e.to_string()))?;

        let tickers: Vec<String> = stocks
            .iter()
            .filter(|s| !s.is_index())
            .map(|s| s.ticker.clone())
            .chain(held.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let outcomes = self.fetch_all(&tickers, date);
        let failed: Vec<String> = outcomes
            .iter()
            .filter(|(_, o)| o.is_error())
            .map(|(t, _)| t.clone())
            .collect();
        if !failed.is_empty() {
            return Err(SkipReason::FetchFailed { tickers: failed });
        }

        let observations = outcomes.into_iter().filter_map(|(_, o)| match o {
            FetchOutcome::Found(obs) => Some(obs),
            _ => None,
        });
        Ok(YearUniverse::new(year, date, stocks, observations))
    }

    /// Availability of `tickers` (default: every known stock) for each year.
    pub fn analyze_availability(
        &self,
        tickers: Option<&[String]>,
    ) -> Result<AvailabilityReport, WeightbenchError> {
        let stocks = self.universe.list_stocks()?;
        let kinds = kind_lookup(&stocks);
        let tickers: Vec<String> = match tickers {
            Some(t) => t.to_vec(),
            None => stocks
                .iter()
                .map(|s| s.ticker.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let mut per_year = Vec::new();
        let mut cancelled = false;
        for year in self.config.years() {
            if self.cancel.is_cancelled() {
                info!("availability: cancelled before {}", year);
                cancelled = true;
                break;
            }
            let date = self
                .valuation_date(year)
                .map_err(|_| WeightbenchError::config_invalid("backtest", "valuation_day", "invalid date"))?;
            let outcomes = self.fetch_all(&tickers, date);
            if let Some((ticker, FetchOutcome::FetchError(reason))) =
                outcomes.iter().find(|(_, o)| o.is_error())
            {
                return Err(WeightbenchError::Fetch {
                    ticker: ticker.clone(),
                    date,
                    reason: reason.clone(),
                });
            }
            per_year.push((year, available_tickers(&kinds, outcomes.iter().map(|(t, o)| (t, o)))));
        }

        Ok(AvailabilityReport {
            tickers,
            years: classify(per_year),
            cancelled,
        })
    }

    fn valuation_date(&self, year: i32) -> Result<NaiveDate, SkipReason> {
        self.config.valuation_date(year).ok_or_else(|| {
            SkipReason::UniverseUnavailable(format!("no valuation date in {year}"))
        })
    }

    fn fetch_all(&self, tickers: &[String], date: NaiveDate) -> Vec<(String, FetchOutcome)> {
        self.pool.install(|| {
            tickers
                .par_iter()
                .map(|t| (t.clone(), self.fetch_with_retry(t, date)))
                .collect()
        })
    }

    fn fetch_with_retry(&self, ticker: &str, date: NaiveDate) -> FetchOutcome {
        let mut attempt = 0u32;
        loop {
            match self.observations.fetch_observation(ticker, date) {
                FetchOutcome::FetchError(reason) if attempt < self.config.fetch_retries => {
                    let delay = self
                        .config
                        .retry_delay
                        .saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        "fetch {} on {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        ticker,
                        date,
                        attempt + 1,
                        self.config.fetch_retries + 1,
                        reason,
                        delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
