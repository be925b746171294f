//! Web server adapter.
//!
//! An Axum server with an HTMX front page: list the trained models, start a
//! backtest in the background, poll its status and view the finished report.

mod error;
mod handlers;
mod templates;

pub use error::WebError;
pub use handlers::*;
pub use templates::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::trace::TraceLayer;

use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::model_store::ModelStore;

/// State of the single background backtest.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JobState {
    #[default]
    Ready,
    Running,
    Succeeded { report: String },
    Failed { message: String },
}

impl JobState {
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Ready => "ready",
            JobState::Running => "running",
            JobState::Succeeded { .. } => "succeeded",
            JobState::Failed { .. } => "failed",
        }
    }
}

pub struct AppState {
    pub config: Arc<dyn ConfigPort + Send + Sync>,
    pub data: Arc<dyn DataPort + Send + Sync>,
    pub store: Arc<dyn ModelStore + Send + Sync>,
    job: Mutex<JobState>,
}

impl AppState {
    pub fn new(
        config: Arc<dyn ConfigPort + Send + Sync>,
        data: Arc<dyn DataPort + Send + Sync>,
        store: Arc<dyn ModelStore + Send + Sync>,
    ) -> Self {
        Self {
            config,
            data,
            store,
            job: Mutex::new(JobState::Ready),
        }
    }

    /// The job lock never guards a partially written state, so a poisoned
    /// lock is still usable.
    pub fn job(&self) -> MutexGuard<'_, JobState> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/backtest", post(handlers::start_backtest))
        .route("/backtest/status", get(handlers::backtest_status))
        .route("/backtest/report", get(handlers::backtest_report))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_htmx_request(headers: &axum::http::HeaderMap) -> bool {
    headers.get("HX-Request").is_some()
}
