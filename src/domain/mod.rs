//! Core domain types and logic.

pub mod arima;
pub mod backtest;
pub mod broker;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod features;
pub mod market_data;
pub mod metrics;
pub mod ohlcv;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod report;
pub mod selection;
pub mod sizing;
pub mod strategy;
pub mod symbol;
pub mod training;
