//! Buy-and-hold with entries: allocate once, then only react to new listings
//! and to tickers that disappear.

use log::{debug, info, warn};

use super::allocation::{Weighting, allocate, floor_shares};
use super::holding::Trade;
use super::observation::Observation;
use super::portfolio::{PortfolioState, YearOutcome};
use super::universe::{SkipReason, YearUniverse};

/// First processed year: spend all cash over the priced universe.
pub fn initialize(
    prior: &PortfolioState,
    universe: &YearUniverse,
    weighting: Weighting,
) -> Result<YearOutcome, SkipReason> {
    let targets = universe.priced_universe();
    if targets.is_empty() {
        return Err(SkipReason::NoPricedObservations);
    }

    let mut state = prior.clone();
    let budget = state.cash;
    let weights = weighting.weights(&targets);
    let trades = allocate(&mut state, &targets, &weights, budget);
    state.recompute_weights();

    info!(
        "{}: buy-and-hold initialized with {} holdings, leftover cash {:.2}",
        universe.year,
        state.holding_count(),
        state.cash
    );

    Ok(YearOutcome {
        state,
        trades,
        dropped: Vec::new(),
    })
}

/// Tickers that may join the portfolio this year: priced, eligible, not
/// already held, and first listed this year or last year.
pub fn admissible_entries<'a>(
    state: &PortfolioState,
    universe: &'a YearUniverse,
) -> Vec<&'a Observation> {
    universe
        .stocks
        .iter()
        .filter(|s| !s.is_index() && !state.has_holding(&s.ticker))
        .filter(|s| s.listed_recently(universe.year))
        .filter_map(|s| universe.priced(&s.ticker))
        .collect()
}

/// Any later year: refresh or drop existing holdings, then dilute them to
/// make room for admissible new listings.
///
/// Held tickers count as priced even after leaving the eligibility window, so
/// the year is degenerate only when neither they nor any eligible equity have
/// an observation.
pub fn advance(prior: &PortfolioState, universe: &YearUniverse) -> Result<YearOutcome, SkipReason> {
    let tickers = prior.tickers();
    if universe.priced_universe().is_empty() && tickers.iter().all(|t| universe.priced(t).is_none()) {
        return Err(SkipReason::NoPricedObservations);
    }

    let mut state = prior.clone();
    let mut dropped = Vec::new();

    for ticker in tickers {
        match universe.priced(&ticker) {
            Some(obs) => state.mark(obs),
            None => {
                if let Some(holding) = state.drop_holding(&ticker) {
                    warn!(
                        "{}: {} has no observation, dropping {} shares (last value {:.2})",
                        universe.year,
                        ticker,
                        holding.shares,
                        holding.value()
                    );
                    dropped.push(holding);
                }
            }
        }
    }

    let entries = admissible_entries(&state, universe);
    let trades = if entries.is_empty() {
        Vec::new()
    } else {
        dilute_and_enter(&mut state, &entries, universe.year)
    };
    state.recompute_weights();

    Ok(YearOutcome {
        state,
        trades,
        dropped,
    })
}

/// Shrink `m` existing holdings to make room for `k` entries at
/// `1 / (m + k)` each.
///
/// Existing share counts are multiplied by `1 - k / (m + k)` and floored; the
/// freed value becomes cash. Each entry then gets a budget of
/// `total_value / (m + k)`, capped by the cash still available.
pub fn dilute_and_enter(
    state: &mut PortfolioState,
    entries: &[&Observation],
    year: i32,
) -> Vec<Trade> {
    let m = state.holding_count();
    let k = entries.len();
    let target_weight = 1.0 / (m + k) as f64;
    let reduction = 1.0 - k as f64 * target_weight;
    let total_value = state.total_value();

    let mut trades = Vec::new();
    for ticker in state.tickers() {
        let Some(holding) = state.holding(&ticker) else {
            continue;
        };
        let keep = ((holding.shares as f64 * reduction).floor() as u64).min(holding.shares);
        let to_sell = holding.shares - keep;
        let price = holding.price;
        if let Some(trade) = state.sell(&ticker, to_sell, price) {
            trades.push(trade);
        }
    }

    let budget = total_value * target_weight;
    for obs in entries {
        let shares = floor_shares(budget.min(state.cash), obs.adjusted_price);
        if let Some(trade) = state.buy(obs, shares) {
            trades.push(trade);
        }
    }

    debug!(
        "{}: admitted {} new tickers into {} existing (target weight {:.4}), cash {:.2}",
        year, k, m, target_weight, state.cash
    );
    trades
}
