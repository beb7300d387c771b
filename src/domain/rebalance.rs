//! Full annual rebalance: liquidate everything, then reallocate to target
//! weights over the year's priced universe.

use log::{debug, warn};

use super::allocation::{Weighting, allocate};
use super::portfolio::{PortfolioState, YearOutcome};
use super::universe::{SkipReason, YearUniverse};

/// Apply one rebalance year to `prior`.
///
/// Holdings whose ticker has no observation this year are dropped with their
/// value unrecovered. The year is rejected, leaving `prior` as is, when no
/// eligible ticker is priced.
pub fn rebalance_year(
    prior: &PortfolioState,
    universe: &YearUniverse,
    weighting: Weighting,
) -> Result<YearOutcome, SkipReason> {
    let targets = universe.priced_universe();
    if targets.is_empty() {
        return Err(SkipReason::NoPricedObservations);
    }

    let mut state = prior.clone();
    let mut trades = Vec::new();
    let mut dropped = Vec::new();

    for ticker in prior.tickers() {
        match universe.priced(&ticker) {
            Some(obs) => {
                if let Some(trade) = state.liquidate(&ticker, obs.adjusted_price) {
                    trades.push(trade);
                }
            }
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

    let budget = state.cash;
    let weights = weighting.weights(&targets);
    trades.extend(allocate(&mut state, &targets, &weights, budget));
    state.recompute_weights();

    debug!(
        "{}: rebalanced into {} holdings, cash {:.2}, {} trades",
        universe.year,
        state.holding_count(),
        state.cash,
        trades.len()
    );

    Ok(YearOutcome {
        state,
        trades,
        dropped,
    })
}
