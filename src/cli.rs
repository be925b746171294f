//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, write_feature_frame};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::html_report_adapter::HtmlReportAdapter;
use crate::adapters::json_model_store::JsonModelStore;
use crate::domain::error::ArimaTraderError;
use crate::domain::symbol::SymbolUniverse;
use crate::pipeline::{self, BacktestRun};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "arimatrader", about = "ARIMA forecasting backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train and save a model for every configured symbol
    Train {
        #[arg(short, long)]
        config: PathBuf,
        /// Train only this symbol
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Run a backtest and write the HTML report
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Export the feature frame of one symbol as CSV
    Features {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print each symbol's forecast and the symbol the strategy would trade
    Forecast {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// Show data range and model status per symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Train { config, .. }
            | Command::Backtest { config, .. }
            | Command::Features { config, .. }
            | Command::Forecast { config, .. }
            | Command::Info { config }
            | Command::Serve { config } => config,
        }
    }
}

type CommandResult = Result<ExitCode, ArimaTraderError>;

pub fn run(cli: Cli) -> ExitCode {
    let path = cli.command.config_path();
    eprintln!("Loading config from {}", path.display());
    let config = match FileConfigAdapter::from_file(path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let result = match cli.command {
        Command::Train { symbol, .. } => run_train(&config, symbol.as_deref()),
        Command::Backtest { dry_run: true, .. } => run_dry_run(&config),
        Command::Backtest { output, .. } => run_backtest(&config, output.as_deref()),
        Command::Features { symbol, output, .. } => {
            run_features(&config, &symbol, output.as_deref())
        }
        Command::Forecast { horizon, .. } => run_forecast(&config, horizon),
        Command::Info { .. } => run_info(&config),
        Command::Serve { .. } => run_serve(config),
    };
    result.unwrap_or_else(|e| fail(&e))
}

fn fail(err: &ArimaTraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

/// CSV data source and JSON model store rooted at the configured directories.
fn open_ports(config: &FileConfigAdapter) -> (CsvAdapter, JsonModelStore) {
    (
        CsvAdapter::new(pipeline::data_dir(config)),
        JsonModelStore::new(pipeline::models_dir(config)),
    )
}

fn run_train(config: &FileConfigAdapter, symbol: Option<&str>) -> CommandResult {
    let (data, store) = open_ports(config);
    let summary = pipeline::train(config, &data, &store, symbol)?;

    eprintln!("\n=== Trained Models ===");
    for m in &summary.trained {
        let accuracy = match &m.evaluation {
            Some(ev) => match ev.mape {
                Some(mape) => format!("RMSE {:.3}, MAPE {:.2}%", ev.rmse, mape),
                None => format!("RMSE {:.3}", ev.rmse),
            },
            None => "no holdout".to_string(),
        };
        eprintln!(
            "  {}:  {} on {} bars ({} to {}), {}",
            m.symbol,
            m.model.order,
            m.train_bars,
            m.train_start,
            m.train_end,
            accuracy,
        );
    }

    if summary.is_complete() {
        eprintln!("\nModels written to: {}", pipeline::models_dir(config).display());
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("\n=== Failed ===");
    for (symbol, err) in &summary.failed {
        eprintln!("  {symbol}:  {err}");
    }
    // the first failure decides the exit code
    Ok(summary
        .failed
        .first()
        .map_or(ExitCode::FAILURE, |(_, err)| ExitCode::from(err)))
}

fn run_backtest(config: &FileConfigAdapter, output: Option<&Path>) -> CommandResult {
    let (data, store) = open_ports(config);
    let run = pipeline::run_backtest_pipeline(config, &data, &store)?;
    print_summary(&run);

    let output = output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| pipeline::report_output(config));
    HtmlReportAdapter.write(&run.report_context(), &output)?;
    eprintln!("\nReport written to: {output}");
    Ok(ExitCode::SUCCESS)
}

fn print_summary(run: &BacktestRun) {
    let metrics = &run.metrics;
    let counts = &run.result.counts;

    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Final Equity:     {:.2}", metrics.final_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);

    eprintln!("\n=== Iterations ===");
    eprintln!("Trading Days:     {}", counts.iterations);
    eprintln!("Orders:           {}", counts.orders);
    eprintln!("No Signal:        {}", counts.no_signal);
    eprintln!("Insufficient:     {}", counts.insufficient_funds);
    eprintln!("Rejected:         {}", counts.rejected);
    eprintln!("Bracket Exits:    {}", counts.bracket_exits);
    eprintln!("Liquidations:     {}", counts.liquidations);

    if !run.symbol_results.is_empty() {
        eprintln!("\n=== Per-Symbol Summary ===");
        for sr in &run.symbol_results {
            let pnl_sign = if sr.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}${:.0}",
                sr.symbol,
                sr.total_trades,
                sr.win_rate * 100.0,
                pnl_sign,
                sr.total_pnl,
            );
        }
    }
}

fn run_dry_run(config: &FileConfigAdapter) -> CommandResult {
    let (data, store) = open_ports(config);
    let dry = pipeline::dry_run(config, &data, &store)?;
    eprintln!("Config validated successfully");

    let p = &dry.params;
    eprintln!("\nStrategy: {}", p.name);
    eprintln!("  cash_at_risk:     {}", p.cash_at_risk);
    eprintln!("  forecast_horizon: {}", p.forecast_horizon);
    eprintln!("  forecast_from:    {}", p.forecast_from);
    eprintln!(
        "  long bracket:     TP x{:.2}, SL x{:.2}",
        p.bracket.long_take_profit, p.bracket.long_stop_loss
    );
    eprintln!(
        "  short bracket:    TP x{:.2}, SL x{:.2}",
        p.bracket.short_take_profit, p.bracket.short_stop_loss
    );

    let c = &dry.config;
    eprintln!("\nBacktest: {} to {}", c.start_date, c.end_date);
    eprintln!("  initial_capital:  {:.2}", c.initial_capital);

    eprintln!("\nUniverse:");
    for s in &dry.symbols {
        let data = match s.data_range {
            Some((first, last, count)) => format!("{count} bars, {first} to {last}"),
            None => "no data".to_string(),
        };
        let model = if s.model_present { "model ok" } else { "model missing" };
        eprintln!("  {} ({}):  {}, {}", s.ticker, s.name, data, model);
    }

    let missing = dry.missing_models();
    if !missing.is_empty() {
        eprintln!("\nerror: missing models: {}", missing.join(", "));
        eprintln!("run `arimatrader train` first");
        return Ok(ExitCode::from(4));
    }
    if !dry.is_ready() {
        eprintln!("\nerror: no price data for any symbol");
        return Ok(ExitCode::from(5));
    }

    eprintln!("\nDry run complete: configuration is valid");
    Ok(ExitCode::SUCCESS)
}

fn run_features(config: &FileConfigAdapter, symbol: &str, output: Option<&Path>) -> CommandResult {
    let (data, _) = open_ports(config);
    let frame = pipeline::feature_frame(config, &data, symbol)?;

    match output {
        Some(path) => {
            write_feature_frame(&frame, BufWriter::new(File::create(path)?))?;
            eprintln!(
                "{} rows, {} feature columns written to: {}",
                frame.len(),
                frame.columns.len(),
                path.display()
            );
        }
        None => write_feature_frame(&frame, io::stdout().lock())?,
    }
    Ok(ExitCode::SUCCESS)
}

fn run_forecast(config: &FileConfigAdapter, horizon: Option<usize>) -> CommandResult {
    let (data, store) = open_ports(config);
    let report = pipeline::forecast(config, &data, &store, horizon)?;

    eprintln!("Forecast as of {}", report.as_of);
    for (symbol, result) in &report.forecasts {
        match result {
            Ok(sel) => println!(
                "{symbol}: last {:.2}, predicted change {:+.2}%",
                sel.last_price,
                sel.pct_change * 100.0
            ),
            Err(e) => eprintln!("{symbol}: forecast failed ({e})"),
        }
    }
    match &report.best {
        Some(best) => {
            let side = if best.pct_change > 0.0 { "buy" } else { "sell" };
            println!("selected: {} ({side})", best.symbol);
        }
        None => println!("selected: none"),
    }
    Ok(ExitCode::SUCCESS)
}

fn run_info(config: &FileConfigAdapter) -> CommandResult {
    let (data, store) = open_ports(config);
    let universe = SymbolUniverse::from_config(config)?;
    let statuses = pipeline::symbol_status(&universe, &data, &store)?;

    for s in &statuses {
        match s.data_range {
            Some((min_date, max_date, count)) => {
                println!("{}: {} bars, {} to {}", s.ticker, count, min_date, max_date)
            }
            None => eprintln!("{}: no data found", s.ticker),
        }
        if s.model_present {
            println!("  model: {}", s.model_location);
        } else {
            println!("  model: missing ({})", s.model_location);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "web")]
fn run_serve(config: FileConfigAdapter) -> CommandResult {
    use crate::adapters::web::{AppState, build_router};
    use crate::ports::config_port::ConfigPort;
    use std::net::SocketAddr;
    use std::sync::Arc;

    let listen = config
        .get_string("web", "listen")
        .unwrap_or_else(|| pipeline::DEFAULT_LISTEN.to_string());
    let addr: SocketAddr = listen.parse().map_err(|_| ArimaTraderError::ConfigInvalid {
        section: "web".into(),
        key: "listen".into(),
        reason: format!("invalid socket address '{listen}'"),
    })?;

    let (data, store) = open_ports(&config);
    let state = AppState::new(Arc::new(config), Arc::new(data), Arc::new(store));
    let router = build_router(Arc::new(state));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        eprintln!("Starting web server on {addr}");
        axum::serve(listener, router).await
    })?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(not(feature = "web"))]
fn run_serve(_config: FileConfigAdapter) -> CommandResult {
    eprintln!("error: web feature is required for serve");
    Ok(ExitCode::from(1))
}
