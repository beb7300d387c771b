//! Per-(ticker, date) price and market-cap observations.

use chrono::NaiveDate;

/// One observation for a ticker near a valuation date.
///
/// Share count and market cap are optional and checked by presence: a
/// reported zero is a real value, not "missing".
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub ticker: String,
    pub date: NaiveDate,
    pub price: f64,
    pub adjusted_price: f64,
    pub shares_outstanding: Option<f64>,
    pub market_cap: Option<f64>,
}

impl Observation {
    /// Reported market cap, or shares outstanding times price when only the
    /// share count is known.
    pub fn effective_market_cap(&self) -> Option<f64> {
        self.market_cap
            .or_else(|| self.shares_outstanding.map(|shares| shares * self.price))
    }

    /// Whether this observation can be used for share-count math.
    pub fn is_priced(&self) -> bool {
        self.adjusted_price.is_finite() && self.adjusted_price > 0.0
    }

    /// Whether the observation counts as "available" for availability
    /// analysis. Index instruments do not need a market cap.
    pub fn is_valid(&self, is_index: bool) -> bool {
        if !(self.price.is_finite() && self.price > 0.0) {
            return false;
        }
        is_index || self.effective_market_cap().is_some_and(|cap| cap > 0.0)
    }
}

/// Result of asking the observation collaborator for one (ticker, date).
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(Observation),
    /// No trading data: not yet listed, delisted, or simply unavailable.
    NotFound,
    /// The collaborator failed; the ticker's status is unknown.
    FetchError(String),
}

impl FetchOutcome {
    pub fn found(&self) -> Option<&Observation> {
        match self {
            FetchOutcome::Found(obs) => Some(obs),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FetchOutcome::FetchError(_))
    }

    /// Only definitive answers may be cached.
    pub fn is_cacheable(&self) -> bool {
        !self.is_error()
    }
}
