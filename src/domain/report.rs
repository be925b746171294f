//! Everything a report renderer needs from one backtest run.

use chrono::NaiveDate;

use crate::domain::backtest::BacktestResult;
use crate::domain::metrics::{Metrics, SymbolResult};
use crate::domain::strategy::StrategyParams;
use crate::domain::training::TrainedModel;

pub struct ReportContext<'a> {
    pub params: &'a StrategyParams,
    pub result: &'a BacktestResult,
    pub metrics: &'a Metrics,
    pub symbol_results: &'a [SymbolResult],
    pub models: &'a [TrainedModel],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
}
