//! Backtest engine and event loop.
//!
//! One iteration per date of the unified timeline:
//! 1. move the broker to the date (bracket exits on that day's bars),
//! 2. run the strategy at the close,
//! 3. record equity.
//!
//! Positions still open after the last date are closed at their last close.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::broker::SimulatedBroker;
use crate::domain::error::ArimaTraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::market_data::SymbolData;
use crate::domain::order::{ExitReason, Fill};
use crate::domain::portfolio::Portfolio;
use crate::domain::strategy::{ArimaStrategy, IterationOutcome};
use crate::domain::symbol::SymbolUniverse;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    /// Read `[backtest]`; missing dates default to the universe window.
    pub fn from_config(
        config: &dyn ConfigPort,
        universe: &SymbolUniverse,
    ) -> Result<Self, ArimaTraderError> {
        let (window_start, window_end) = universe.backtest_window();
        Ok(BacktestConfig {
            start_date: config.get_date("backtest", "start_date")?.unwrap_or(window_start),
            end_date: config.get_date("backtest", "end_date")?.unwrap_or(window_end),
            initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
            commission_per_trade: config.get_double("backtest", "commission_per_trade", 0.0),
            commission_pct: config.get_double("backtest", "commission_pct", 0.0),
            slippage_pct: config.get_double("backtest", "slippage_pct", 0.0),
            risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.05),
        })
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationCounts {
    pub iterations: usize,
    pub orders: usize,
    pub no_signal: usize,
    pub insufficient_funds: usize,
    pub rejected: usize,
    pub bracket_exits: usize,
    pub liquidations: usize,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    /// Every fill in execution order, entries and exits.
    pub fills: Vec<Fill>,
    pub counts: IterationCounts,
}

pub fn run_backtest(
    data: Vec<SymbolData>,
    timeline: &[NaiveDate],
    strategy: &mut ArimaStrategy,
    config: &BacktestConfig,
) -> BacktestResult {
    let mut broker = SimulatedBroker::new(data, config.initial_capital, config.execution_config());
    let mut counts = IterationCounts::default();

    for &date in timeline {
        if date < config.start_date || date > config.end_date {
            continue;
        }
        counts.iterations += 1;
        counts.bracket_exits += broker.advance_to(date).len();

        match strategy.on_trading_iteration(&mut broker) {
            Ok(IterationOutcome::Submitted { liquidated, .. }) => {
                counts.orders += 1;
                counts.liquidations += liquidated;
            }
            Ok(IterationOutcome::NoSignal) => counts.no_signal += 1,
            Ok(IterationOutcome::InsufficientFunds { .. }) => counts.insufficient_funds += 1,
            Err(e) => {
                warn!(%date, error = %e, "iteration failed");
                counts.rejected += 1;
            }
        }

        broker.record_equity();
    }

    let closed = broker.close_all(ExitReason::EndOfBacktest);
    if !closed.is_empty() {
        // exit costs of the forced close belong to the final day
        broker.restate_equity();
        info!(positions = closed.len(), "closed open positions at end of backtest");
    }

    info!(
        iterations = counts.iterations,
        orders = counts.orders,
        bracket_exits = counts.bracket_exits,
        final_equity = broker.equity(),
        "backtest finished"
    );

    let (portfolio, fills) = broker.into_parts();
    BacktestResult {
        portfolio,
        fills,
        counts,
    }
}
