//! Target-weight computation and integer share sizing.

use super::holding::Trade;
use super::observation::Observation;
use super::portfolio::PortfolioState;

/// How a strategy splits capital across its priced universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weighting {
    Equal,
    MarketCap,
}

impl Weighting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weighting::Equal => "equal",
            Weighting::MarketCap => "cap",
        }
    }

    /// Weights aligned with `observations`.
    pub fn weights(&self, observations: &[&Observation]) -> Vec<f64> {
        match self {
            Weighting::Equal => equal_weights(observations.len()),
            Weighting::MarketCap => {
                let caps: Vec<f64> = observations
                    .iter()
                    .map(|o| o.effective_market_cap().unwrap_or(0.0))
                    .collect();
                market_cap_weights(&caps)
            }
        }
    }
}

/// `n` equal fractions summing to 1. Returns an empty vector for `n == 0`;
/// callers must not allocate over an empty universe.
pub fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// `cap_i / sum(cap)`. Negative or non-finite caps count as zero.
///
/// When the total is zero the result degrades to equal weighting rather than
/// dividing by zero.
pub fn market_cap_weights(caps: &[f64]) -> Vec<f64> {
    let cleaned: Vec<f64> = caps
        .iter()
        .map(|&c| if c.is_finite() && c > 0.0 { c } else { 0.0 })
        .collect();
    let total: f64 = cleaned.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        log::debug!(
            "market cap total is zero across {} tickers, falling back to equal weights",
            caps.len()
        );
        return equal_weights(caps.len());
    }
    cleaned.iter().map(|c| c / total).collect()
}

/// Largest whole share count whose cost does not exceed `amount`.
pub fn floor_shares(amount: f64, price: f64) -> u64 {
    if !price.is_finite() || !amount.is_finite() || price <= 0.0 || amount <= 0.0 {
        return 0;
    }
    let mut shares = (amount / price).floor() as u64;
    // amount / price can round up across an integer boundary.
    while shares > 0 && shares as f64 * price > amount {
        shares -= 1;
    }
    shares
}

/// Spend `budget` across `observations` according to `weights`.
///
/// Each ticker receives `floor(budget * weight / price)` shares, further
/// capped by the cash actually left so the portfolio never goes negative.
pub fn allocate(
    state: &mut PortfolioState,
    observations: &[&Observation],
    weights: &[f64],
    budget: f64,
) -> Vec<Trade> {
    let mut trades = Vec::with_capacity(observations.len());
    for (obs, &weight) in observations.iter().zip(weights) {
        let target = budget * weight;
        let shares = floor_shares(target.min(state.cash), obs.adjusted_price);
        if shares == 0 {
            continue;
        }
        if let Some(trade) = state.buy(obs, shares) {
            trades.push(trade);
        }
    }
    trades
}
