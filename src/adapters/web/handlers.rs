//! HTTP request handlers for web adapter.

use askama::Template;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::adapters::html_report_adapter::HtmlReportAdapter;
use crate::domain::strategy::StrategyParams;
use crate::domain::symbol::SymbolUniverse;
use crate::pipeline::run_backtest_pipeline;
use crate::ports::report_port::ReportPort;

use super::templates::{IndexTemplate, ModelRow, StatusBody, StatusTemplate, param_rows};
use super::{AppState, JobState, WebError, is_htmx_request};

fn render<T: Template>(template: &T) -> Result<Html<String>, WebError> {
    template
        .render()
        .map(Html)
        .map_err(|e| WebError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// HTMX callers get the status fragment, everyone else JSON.
fn status_response(job: &JobState, headers: &HeaderMap) -> Result<Response, WebError> {
    if is_htmx_request(headers) {
        Ok(render(&StatusTemplate::from(job))?.into_response())
    } else {
        Ok(Json(StatusBody::from(job)).into_response())
    }
}

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, WebError> {
    let universe = SymbolUniverse::from_config(&*state.config)?;
    let params = StrategyParams::from_config(&*state.config)?;

    let mut models = Vec::with_capacity(universe.len());
    let mut missing = Vec::new();
    for info in universe.symbols() {
        match state.store.load(&info.ticker) {
            Ok(m) => models.push(ModelRow::from(&m)),
            Err(e) => {
                debug!(symbol = %info.ticker, error = %e, "model unavailable");
                missing.push(info.ticker.clone());
            }
        }
    }

    // a fragment that fails to render fails the page
    let Html(status) = render(&StatusTemplate::from(&*state.job()))?;
    render(&IndexTemplate {
        models,
        missing,
        params: param_rows(&params),
        status,
    })
}

/// Run the whole backtest and render its report. Blocking.
fn run_job(state: &AppState) -> JobState {
    let outcome = run_backtest_pipeline(&*state.config, &*state.data, &*state.store)
        .and_then(|run| {
            info!(
                final_equity = run.metrics.final_equity,
                trades = run.metrics.total_trades,
                "backtest finished"
            );
            HtmlReportAdapter.render(&run.report_context())
        });
    match outcome {
        Ok(report) => JobState::Succeeded { report },
        Err(e) => {
            error!(error = %e, "backtest failed");
            JobState::Failed {
                message: e.to_string(),
            }
        }
    }
}

pub async fn start_backtest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let universe = SymbolUniverse::from_config(&*state.config)?;
    let missing = state.store.missing(&universe.tickers());
    if !missing.is_empty() {
        return Err(WebError::unprocessable(format!(
            "missing models: {}",
            missing.join(", ")
        )));
    }

    {
        let mut job = state.job();
        if *job == JobState::Running {
            return Err(WebError::conflict("a backtest is already running"));
        }
        *job = JobState::Running;
    }
    info!("backtest started");

    let worker = Arc::clone(&state);
    let owner = Arc::clone(&state);
    tokio::spawn(async move {
        let next = match tokio::task::spawn_blocking(move || run_job(&worker)).await {
            Ok(next) => next,
            Err(e) => {
                error!(error = %e, "backtest task aborted");
                JobState::Failed {
                    message: format!("backtest task aborted: {e}"),
                }
            }
        };
        *owner.job() = next;
    });

    let response = status_response(&JobState::Running, &headers)?;
    Ok((StatusCode::ACCEPTED, response).into_response())
}

pub async fn backtest_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let job = state.job().clone();
    status_response(&job, &headers)
}

pub async fn backtest_report(State(state): State<Arc<AppState>>) -> Result<Html<String>, WebError> {
    match &*state.job() {
        JobState::Succeeded { report } => Ok(Html(report.clone())),
        _ => Err(WebError::not_found("no report available")),
    }
}

pub async fn not_found() -> WebError {
    WebError::not_found("page not found")
}
