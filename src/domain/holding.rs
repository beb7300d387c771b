//! Holdings and trade audit records.

/// A position in one ticker. Exists only while `shares > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub shares: u64,
    /// Last observed adjusted price.
    pub price: f64,
    pub market_cap: Option<f64>,
    /// Fraction of total portfolio value, refreshed after every trade batch.
    pub weight: f64,
}

impl Holding {
    pub fn value(&self) -> f64 {
        self.shares as f64 * self.price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

/// Ephemeral record of one executed order; not part of portfolio state.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub ticker: String,
    pub action: TradeAction,
    pub shares: u64,
    pub price: f64,
    pub value: f64,
}

impl Trade {
    pub fn new(ticker: &str, action: TradeAction, shares: u64, price: f64) -> Self {
        Trade {
            ticker: ticker.to_string(),
            action,
            shares,
            price,
            value: shares as f64 * price,
        }
    }
}
