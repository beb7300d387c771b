//! Portfolio state and the yearly snapshot history.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::holding::{Holding, Trade, TradeAction};
use super::observation::Observation;

/// Purchases may overshoot cash by at most this much from float noise; cash is
/// clamped back to zero afterwards.
const CASH_TOLERANCE: f64 = 1e-6;

/// One year's recorded portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub year: i32,
    pub date: NaiveDate,
    pub total_value: f64,
    pub cash: f64,
    /// Sorted by ticker.
    pub holdings: Vec<Holding>,
}

impl Snapshot {
    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.ticker == ticker)
    }

    pub fn weight_sum(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }
}

/// Result of applying one year to a portfolio. Engines build this from a
/// copy of the prior state so a failed year leaves the original untouched.
#[derive(Debug, Clone)]
pub struct YearOutcome {
    pub state: PortfolioState,
    pub trades: Vec<Trade>,
    /// Holdings removed because their ticker had no observation this year.
    pub dropped: Vec<Holding>,
}

/// Holdings plus cash for a single strategy run.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    holdings: BTreeMap<String, Holding>,
}

impl PortfolioState {
    pub fn new(cash: f64) -> Self {
        PortfolioState {
            cash,
            holdings: BTreeMap::new(),
        }
    }

    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values()
    }

    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.get(ticker)
    }

    pub fn has_holding(&self, ticker: &str) -> bool {
        self.holdings.contains_key(ticker)
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.holdings.keys().cloned().collect()
    }

    pub fn holdings_value(&self) -> f64 {
        self.holdings.values().map(Holding::value).sum()
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.holdings_value()
    }

    /// Buy `shares` at the observation's adjusted price.
    ///
    /// Returns `None` without changing anything if the cost exceeds cash.
    pub fn buy(&mut self, obs: &Observation, shares: u64) -> Option<Trade> {
        if shares == 0 {
            return None;
        }
        let price = obs.adjusted_price;
        let cost = shares as f64 * price;
        if cost > self.cash + CASH_TOLERANCE {
            return None;
        }
        self.cash = (self.cash - cost).max(0.0);

        let holding = self
            .holdings
            .entry(obs.ticker.clone())
            .or_insert_with(|| Holding {
                ticker: obs.ticker.clone(),
                shares: 0,
                price,
                market_cap: None,
                weight: 0.0,
            });
        holding.shares += shares;
        holding.price = price;
        holding.market_cap = obs.effective_market_cap();

        Some(Trade::new(&obs.ticker, TradeAction::Buy, shares, price))
    }

    /// Sell up to `shares` at `price`, removing the holding when it reaches zero.
    pub fn sell(&mut self, ticker: &str, shares: u64, price: f64) -> Option<Trade> {
        let holding = self.holdings.get_mut(ticker)?;
        let shares = shares.min(holding.shares);
        if shares == 0 {
            return None;
        }
        holding.shares -= shares;
        holding.price = price;
        self.cash += shares as f64 * price;
        if holding.shares == 0 {
            self.holdings.remove(ticker);
        }
        Some(Trade::new(ticker, TradeAction::Sell, shares, price))
    }

    pub fn liquidate(&mut self, ticker: &str, price: f64) -> Option<Trade> {
        let shares = self.holdings.get(ticker)?.shares;
        self.sell(ticker, shares, price)
    }

    /// Remove a holding without crediting any cash.
    pub fn drop_holding(&mut self, ticker: &str) -> Option<Holding> {
        self.holdings.remove(ticker)
    }

    /// Refresh a holding's price and market cap from a new observation.
    pub fn mark(&mut self, obs: &Observation) {
        if let Some(holding) = self.holdings.get_mut(&obs.ticker) {
            holding.price = obs.adjusted_price;
            holding.market_cap = obs.effective_market_cap();
        }
    }

    /// Recompute every weight from realized values.
    pub fn recompute_weights(&mut self) {
        let total = self.total_value();
        for holding in self.holdings.values_mut() {
            holding.weight = if total > 0.0 {
                holding.value() / total
            } else {
                0.0
            };
        }
    }

    pub fn snapshot(&self, year: i32, date: NaiveDate) -> Snapshot {
        Snapshot {
            year,
            date,
            total_value: self.total_value(),
            cash: self.cash,
            holdings: self.holdings.values().cloned().collect(),
        }
    }
}
