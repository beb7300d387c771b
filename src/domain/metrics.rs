//! Return calculations over a snapshot history.

use super::portfolio::Snapshot;

const DAYS_PER_YEAR: f64 = 365.25;

/// `(end - start) / start`, or 0 when `start <= 0`.
pub fn total_return(start: f64, end: f64) -> f64 {
    if start <= 0.0 {
        return 0.0;
    }
    (end - start) / start
}

/// `(end / start)^(1 / years) - 1`, or 0 when `start <= 0` or `years <= 0`.
pub fn annualized_return(start: f64, end: f64, years: f64) -> f64 {
    if start <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    let ratio = end / start;
    if ratio <= 0.0 {
        return -1.0;
    }
    ratio.powf(1.0 / years) - 1.0
}

/// Elapsed years between the first and last snapshot dates.
pub fn elapsed_years(snapshots: &[Snapshot]) -> f64 {
    match (snapshots.first(), snapshots.last()) {
        (Some(first), Some(last)) => (last.date - first.date).num_days() as f64 / DAYS_PER_YEAR,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearReturn {
    pub year: i32,
    pub value: f64,
    /// Return since the previous snapshot.
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub start_value: f64,
    pub end_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub years: f64,
    pub max_drawdown: f64,
    pub yearly: Vec<YearReturn>,
}

impl Metrics {
    /// Reduce a snapshot history. An empty history yields zero returns with
    /// both values at `fallback_value`.
    pub fn compute(snapshots: &[Snapshot], fallback_value: f64) -> Self {
        let start_value = snapshots
            .first()
            .map(|s| s.total_value)
            .unwrap_or(fallback_value);
        let end_value = snapshots
            .last()
            .map(|s| s.total_value)
            .unwrap_or(fallback_value);
        let years = elapsed_years(snapshots);

        Metrics {
            start_value,
            end_value,
            total_return: total_return(start_value, end_value),
            annualized_return: annualized_return(start_value, end_value, years),
            years,
            max_drawdown: max_drawdown(snapshots),
            yearly: yearly_returns(snapshots),
        }
    }
}

pub fn yearly_returns(snapshots: &[Snapshot]) -> Vec<YearReturn> {
    snapshots
        .windows(2)
        .map(|w| YearReturn {
            year: w[1].year,
            value: w[1].total_value,
            change: total_return(w[0].total_value, w[1].total_value),
        })
        .collect()
}

/// Largest peak-to-trough decline as a fraction of the peak.
pub fn max_drawdown(snapshots: &[Snapshot]) -> f64 {
    let Some(first) = snapshots.first() else {
        return 0.0;
    };

    let mut peak = first.total_value;
    let mut max_dd = 0.0_f64;
    for snap in snapshots {
        if snap.total_value > peak {
            peak = snap.total_value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - snap.total_value) / peak);
        }
    }
    max_dd
}
