//! Core domain types and logic.

pub mod candle;
pub mod drawdown;
pub mod roi;
pub mod stoploss;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod pair_data;
pub mod config_validation;
pub mod error;
