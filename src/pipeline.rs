//! End-to-end stages shared by the CLI and the web server.
//!
//! Every function here takes its collaborators as port trait objects, so the
//! same stage runs against CSV files and JSON models in production and
//! against in-memory fakes in tests.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::backtest::{BacktestConfig, BacktestResult, run_backtest};
use crate::domain::broker::SimulatedBroker;
use crate::domain::config_validation::validate_all;
use crate::domain::error::ArimaTraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::features::{FeatureFrame, add_features};
use crate::domain::market_data::{SymbolData, build_unified_timeline};
use crate::domain::metrics::{Metrics, SymbolResult};
use crate::domain::report::ReportContext;
use crate::domain::selection::{Selection, select_best};
use crate::domain::strategy::{ArimaStrategy, StrategyParams};
use crate::domain::symbol::SymbolUniverse;
use crate::domain::training::{TrainedModel, TrainingConfig, TrainingSummary, train_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::model_store::ModelStore;

pub const DEFAULT_DATA_DIR: &str = "./Stock Data";
pub const DEFAULT_MODELS_DIR: &str = "./Models";
pub const DEFAULT_REPORT: &str = "report.html";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

pub fn data_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("data", "dir")
            .unwrap_or_else(|| DEFAULT_DATA_DIR.into()),
    )
}

pub fn models_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("models", "dir")
            .unwrap_or_else(|| DEFAULT_MODELS_DIR.into()),
    )
}

pub fn report_output(config: &dyn ConfigPort) -> String {
    config
        .get_string("report", "output")
        .unwrap_or_else(|| DEFAULT_REPORT.into())
}

/// Train every configured symbol, or only `symbol` when given.
pub fn train(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    store: &dyn ModelStore,
    symbol: Option<&str>,
) -> Result<TrainingSummary, ArimaTraderError> {
    validate_all(config)?;
    let mut universe = SymbolUniverse::from_config(config)?;
    if let Some(ticker) = symbol {
        universe = universe.restrict_to(ticker)?;
    }
    let training = TrainingConfig::from_config(config)?;
    info!(symbols = universe.len(), "training started");
    let summary = train_universe(&universe, data, store, &training);
    info!(
        trained = summary.trained.len(),
        failed = summary.failed.len(),
        "training finished"
    );
    Ok(summary)
}

/// Load a model for every symbol, failing on the first missing or unreadable one.
pub fn load_models(
    universe: &SymbolUniverse,
    store: &dyn ModelStore,
) -> Result<Vec<TrainedModel>, ArimaTraderError> {
    universe
        .symbols()
        .iter()
        .map(|info| store.load(&info.ticker))
        .collect()
}

/// Bars for each symbol from its first bar up to `end`. Symbols without any
/// data are skipped with a warning; no data at all is an error.
pub fn load_market_data(
    universe: &SymbolUniverse,
    data: &dyn DataPort,
    end: NaiveDate,
) -> Result<Vec<SymbolData>, ArimaTraderError> {
    let mut loaded = Vec::with_capacity(universe.len());
    for info in universe.symbols() {
        let bars = data.fetch_ohlcv(&info.ticker, NaiveDate::MIN, end)?;
        if bars.is_empty() {
            warn!(symbol = %info.ticker, "no price data, skipping");
            continue;
        }
        loaded.push(SymbolData::new(info.ticker.clone(), bars));
    }
    if loaded.is_empty() {
        return Err(ArimaTraderError::NoData {
            symbol: universe.tickers().join(","),
        });
    }
    Ok(loaded)
}

/// Everything produced by one backtest, ready for reporting.
pub struct BacktestRun {
    pub params: StrategyParams,
    pub config: BacktestConfig,
    pub models: Vec<TrainedModel>,
    pub result: BacktestResult,
    pub metrics: Metrics,
    pub symbol_results: Vec<SymbolResult>,
}

impl BacktestRun {
    pub fn report_context(&self) -> ReportContext<'_> {
        ReportContext {
            params: &self.params,
            result: &self.result,
            metrics: &self.metrics,
            symbol_results: &self.symbol_results,
            models: &self.models,
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            initial_capital: self.config.initial_capital,
        }
    }
}

pub fn run_backtest_pipeline(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    store: &dyn ModelStore,
) -> Result<BacktestRun, ArimaTraderError> {
    validate_all(config)?;
    let universe = SymbolUniverse::from_config(config)?;
    let bt_config = BacktestConfig::from_config(config, &universe)?;
    let params = StrategyParams::from_config(config)?;

    let models = load_models(&universe, store)?;
    info!(models = models.len(), "models loaded");

    let market = load_market_data(&universe, data, bt_config.end_date)?;
    let timeline = build_unified_timeline(&market);
    info!(
        symbols = market.len(),
        dates = timeline.len(),
        start = %bt_config.start_date,
        end = %bt_config.end_date,
        "running backtest"
    );

    let mut strategy = ArimaStrategy::new(models, params);
    let result = run_backtest(market, &timeline, &mut strategy, &bt_config);
    let metrics = Metrics::compute(&result.portfolio, bt_config.risk_free_rate);
    let symbol_results = SymbolResult::compute_per_symbol(&result.portfolio.closed_trades);

    let (params, models) = strategy.into_parts();
    Ok(BacktestRun {
        params,
        config: bt_config,
        models,
        result,
        metrics,
        symbol_results,
    })
}

/// Per-symbol data and model status, for `info` and dry runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolStatus {
    pub ticker: String,
    pub name: String,
    pub window: (NaiveDate, NaiveDate),
    pub data_range: Option<(NaiveDate, NaiveDate, usize)>,
    pub model_location: String,
    pub model_present: bool,
}

pub fn symbol_status(
    universe: &SymbolUniverse,
    data: &dyn DataPort,
    store: &dyn ModelStore,
) -> Result<Vec<SymbolStatus>, ArimaTraderError> {
    universe
        .symbols()
        .iter()
        .map(|info| {
            Ok(SymbolStatus {
                ticker: info.ticker.clone(),
                name: info.name.clone(),
                window: (info.start, info.end),
                data_range: data.get_data_range(&info.ticker)?,
                model_location: store.location(&info.ticker),
                model_present: store.exists(&info.ticker),
            })
        })
        .collect()
}

/// Result of a dry run: the parsed configuration and the state of every symbol.
pub struct DryRun {
    pub params: StrategyParams,
    pub config: BacktestConfig,
    pub symbols: Vec<SymbolStatus>,
}

impl DryRun {
    pub fn missing_models(&self) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|s| !s.model_present)
            .map(|s| s.ticker.as_str())
            .collect()
    }

    pub fn missing_data(&self) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|s| s.data_range.is_none())
            .map(|s| s.ticker.as_str())
            .collect()
    }

    pub fn is_ready(&self) -> bool {
        self.missing_models().is_empty() && self.missing_data().len() < self.symbols.len()
    }
}

/// Validate configuration and check inputs without running anything.
pub fn dry_run(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    store: &dyn ModelStore,
) -> Result<DryRun, ArimaTraderError> {
    validate_all(config)?;
    let universe = SymbolUniverse::from_config(config)?;
    Ok(DryRun {
        params: StrategyParams::from_config(config)?,
        config: BacktestConfig::from_config(config, &universe)?,
        symbols: symbol_status(&universe, data, store)?,
    })
}

/// Today's forecast for every symbol and the one the strategy would pick.
pub struct ForecastReport {
    pub as_of: NaiveDate,
    pub forecasts: Vec<(String, Result<Selection, ArimaTraderError>)>,
    pub best: Option<Selection>,
}

/// Forecast every symbol from all available data. `horizon` overrides the
/// configured forecast horizon.
pub fn forecast(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    store: &dyn ModelStore,
    horizon: Option<usize>,
) -> Result<ForecastReport, ArimaTraderError> {
    validate_all(config)?;
    let universe = SymbolUniverse::from_config(config)?;
    let mut params = StrategyParams::from_config(config)?;
    if let Some(h) = horizon {
        if h == 0 {
            return Err(ArimaTraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "forecast_horizon".into(),
                reason: "must be at least 1".into(),
            });
        }
        params.forecast_horizon = h;
    }

    let models = load_models(&universe, store)?;
    let market = load_market_data(&universe, data, NaiveDate::MAX)?;
    let as_of = build_unified_timeline(&market)
        .last()
        .copied()
        .unwrap_or(NaiveDate::MIN);

    let mut broker = SimulatedBroker::new(market, 0.0, ExecutionConfig::default());
    broker.advance_to(as_of);

    let strategy = ArimaStrategy::new(models, params);
    let results = strategy.forecasts(&broker);
    let best = select_best(results.iter().filter_map(|r| r.as_ref().ok()).cloned().map(Ok));
    let forecasts = strategy
        .models()
        .iter()
        .map(|m| m.symbol.clone())
        .zip(results)
        .collect();

    Ok(ForecastReport {
        as_of,
        forecasts,
        best,
    })
}

/// Feature frame for one configured symbol: every bar in its price file up to
/// the window end, as training sees it.
pub fn feature_frame(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    symbol: &str,
) -> Result<FeatureFrame, ArimaTraderError> {
    let universe = SymbolUniverse::from_config(config)?.restrict_to(symbol)?;
    let info = universe
        .symbols()
        .first()
        .ok_or_else(|| ArimaTraderError::NoData {
            symbol: symbol.to_string(),
        })?;
    let bars = data.fetch_ohlcv(&info.ticker, NaiveDate::MIN, info.end)?;
    if bars.is_empty() {
        return Err(ArimaTraderError::NoData {
            symbol: info.ticker.clone(),
        });
    }
    Ok(add_features(bars))
}
