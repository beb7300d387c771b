//! Universe reference data: tickers and their eligibility windows.

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Equity,
    /// Index-tracking instrument; carries no meaningful market cap.
    Index,
}

impl InstrumentKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "equity" | "stock" => Some(InstrumentKind::Equity),
            "index" | "etf" => Some(InstrumentKind::Index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Equity => "equity",
            InstrumentKind::Index => "index",
        }
    }
}

/// A member of the simulated universe.
///
/// The eligibility window is `[start_date, end_date)`; an open end means the
/// stock is still listed.
#[derive(Debug, Clone, PartialEq)]
pub struct Stock {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub kind: InstrumentKind,
}

impl Stock {
    pub fn equity(ticker: &str, start_date: NaiveDate, end_date: Option<NaiveDate>) -> Self {
        Stock {
            ticker: ticker.to_string(),
            start_date,
            end_date,
            kind: InstrumentKind::Equity,
        }
    }

    pub fn is_eligible_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.is_none_or(|end| date < end)
    }

    /// True when the eligibility window opened in `year` or `year - 1`.
    ///
    /// This is the buy-and-hold admission test: older tickers that were
    /// simply not picked at initialization never qualify.
    pub fn listed_recently(&self, year: i32) -> bool {
        let listed = self.start_date.year();
        listed == year || listed == year - 1
    }

    pub fn is_index(&self) -> bool {
        self.kind == InstrumentKind::Index
    }
}
