//! Configuration validation.
//!
//! Every check runs before a strategy is started, so a bad INI file never
//! produces a partial run.

use crate::domain::error::WeightbenchError;
use crate::domain::strategy::parse_strategies;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::time::Duration;

pub const DATA_SOURCES: &[&str] = &["csv", "sqlite"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    validate_initial_investment(config)?;
    validate_years(config)?;
    validate_valuation_date(config)?;
    validate_concurrency(config)?;
    validate_retries(config)?;
    validate_strategies(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    match data_source(config)?.as_str() {
        "sqlite" => {
            require_string(config, "sqlite", "path")?;
            sqlite_pool_size(config)?;
            sqlite_timeout(config)?;
            Ok(())
        }
        _ => require_string(config, "data", "csv_dir").map(|_| ()),
    }
}

pub fn validate_availability_config(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    if let Some(tickers) = config.get_string("availability", "tickers") {
        parse_tickers(&tickers)
            .map_err(|e| WeightbenchError::config_invalid("availability", "tickers", e.to_string()))?;
    }
    Ok(())
}

/// Lower-cased `[data] source`, defaulting to `csv`.
pub fn data_source(config: &dyn ConfigPort) -> Result<String, WeightbenchError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "csv".to_string());
    if !DATA_SOURCES.contains(&source.as_str()) {
        return Err(WeightbenchError::config_invalid(
            "data",
            "source",
            format!("unknown data source '{source}', expected one of: csv, sqlite"),
        ));
    }
    Ok(source)
}

/// `[sqlite] pool_size`, between 1 and `u32::MAX`.
pub fn sqlite_pool_size(config: &dyn ConfigPort) -> Result<u32, WeightbenchError> {
    let value = config.get_int("sqlite", "pool_size", 4);
    match u32::try_from(value) {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(WeightbenchError::config_invalid(
            "sqlite",
            "pool_size",
            format!("pool_size must be between 1 and {}, got {value}", u32::MAX),
        )),
    }
}

pub fn sqlite_timeout(config: &dyn ConfigPort) -> Result<Duration, WeightbenchError> {
    let value = config.get_int("sqlite", "timeout_ms", 5000);
    u64::try_from(value).map(Duration::from_millis).map_err(|_| {
        WeightbenchError::config_invalid("sqlite", "timeout_ms", "timeout_ms must be non-negative")
    })
}

pub fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, WeightbenchError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(WeightbenchError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

pub fn require_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<i64, WeightbenchError> {
    let raw = require_string(config, section, key)?;
    raw.parse::<i64>().map_err(|_| {
        WeightbenchError::config_invalid(section, key, format!("'{raw}' is not an integer"))
    })
}

fn validate_initial_investment(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    let value = config.get_double("backtest", "initial_investment", 0.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(WeightbenchError::config_invalid(
            "backtest",
            "initial_investment",
            "initial_investment must be positive",
        ));
    }
    Ok(())
}

fn validate_years(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    let start = require_int(config, "backtest", "start_year")?;
    let end = require_int(config, "backtest", "end_year")?;
    if start >= end {
        return Err(WeightbenchError::config_invalid(
            "backtest",
            "start_year",
            "start_year must be before end_year",
        ));
    }
    if i32::try_from(start).is_err() || i32::try_from(end).is_err() {
        return Err(WeightbenchError::config_invalid(
            "backtest",
            "end_year",
            "year out of range",
        ));
    }
    Ok(())
}

fn validate_valuation_date(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    let month = config.get_int("backtest", "valuation_month", 1);
    let day = config.get_int("backtest", "valuation_day", 1);
    // 2000 is a leap year, so Feb 29 is accepted here and clamped per year later.
    let valid = u32::try_from(month)
        .ok()
        .zip(u32::try_from(day).ok())
        .and_then(|(m, d)| NaiveDate::from_ymd_opt(2000, m, d))
        .is_some();
    if !valid {
        return Err(WeightbenchError::config_invalid(
            "backtest",
            "valuation_day",
            format!("{month}-{day} is not a valid month/day"),
        ));
    }
    Ok(())
}

fn validate_concurrency(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    let value = config.get_int("backtest", "max_concurrency", 8);
    if value < 1 {
        return Err(WeightbenchError::config_invalid(
            "backtest",
            "max_concurrency",
            "max_concurrency must be at least 1",
        ));
    }
    Ok(())
}

fn validate_retries(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    if config.get_int("backtest", "fetch_retries", 2) < 0 {
        return Err(WeightbenchError::config_invalid(
            "backtest",
            "fetch_retries",
            "fetch_retries must be non-negative",
        ));
    }
    if config.get_int("backtest", "retry_delay_ms", 100) < 0 {
        return Err(WeightbenchError::config_invalid(
            "backtest",
            "retry_delay_ms",
            "retry_delay_ms must be non-negative",
        ));
    }
    Ok(())
}

fn validate_strategies(config: &dyn ConfigPort) -> Result<(), WeightbenchError> {
    if let Some(list) = config.get_string("backtest", "strategies") {
        parse_strategies(&list)
            .map_err(|e| WeightbenchError::config_invalid("backtest", "strategies", e.to_string()))?;
    }
    Ok(())
}
