//! Core domain types and logic.

pub mod allocation;
pub mod availability;
pub mod backtest;
pub mod buy_hold;
pub mod config_validation;
pub mod error;
pub mod holding;
pub mod metrics;
pub mod observation;
pub mod portfolio;
pub mod rebalance;
pub mod runner;
pub mod stock;
pub mod strategy;
pub mod universe;
