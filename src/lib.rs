//! arimatrader: per-symbol ARIMA forecasting, daily best-symbol selection and
//! a simulated-broker backtest with an HTML tearsheet.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`pipeline`] composes them into the
//! stages driven by [`cli`] and the web server.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod pipeline;
pub mod ports;
