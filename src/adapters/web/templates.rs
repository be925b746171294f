//! HTML templates using Askama.

use askama::Template;
use serde::Serialize;

use crate::domain::strategy::StrategyParams;
use crate::domain::training::TrainedModel;

use super::JobState;

/// One trained asset on the front page.
pub struct ModelRow {
    pub name: String,
    pub ticker: String,
    pub period: String,
    pub order: String,
    pub bars: usize,
}

impl From<&TrainedModel> for ModelRow {
    fn from(m: &TrainedModel) -> Self {
        Self {
            name: m.name.clone(),
            ticker: m.symbol.clone(),
            period: format!("{} to {}", m.train_start, m.train_end),
            order: m.model.order.to_string(),
            bars: m.train_bars,
        }
    }
}

pub struct ParamRow {
    pub label: &'static str,
    pub value: String,
}

pub fn param_rows(params: &StrategyParams) -> Vec<ParamRow> {
    let b = &params.bracket;
    vec![
        ParamRow {
            label: "Strategy",
            value: params.name.clone(),
        },
        ParamRow {
            label: "Cash at risk",
            value: format!("{:.0}%", params.cash_at_risk * 100.0),
        },
        ParamRow {
            label: "Forecast horizon",
            value: format!("{} days from {}", params.forecast_horizon, params.forecast_from),
        },
        ParamRow {
            label: "Long bracket",
            value: format!("TP x{:.2}, SL x{:.2}", b.long_take_profit, b.long_stop_loss),
        },
        ParamRow {
            label: "Short bracket",
            value: format!("TP x{:.2}, SL x{:.2}", b.short_take_profit, b.short_stop_loss),
        },
    ]
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub models: Vec<ModelRow>,
    pub missing: Vec<String>,
    pub params: Vec<ParamRow>,
    /// Rendered [`StatusTemplate`] fragment.
    pub status: String,
}

/// Backtest status fragment; polls itself while the job runs.
#[derive(Template)]
#[template(path = "status.html")]
pub struct StatusTemplate {
    pub state: &'static str,
    pub message: Option<String>,
}

impl StatusTemplate {
    pub fn running(&self) -> bool {
        self.state == "running"
    }

    pub fn has_report(&self) -> bool {
        self.state == "succeeded"
    }
}

impl From<&JobState> for StatusTemplate {
    fn from(job: &JobState) -> Self {
        let message = match job {
            JobState::Failed { message } => Some(message.clone()),
            _ => None,
        };
        Self {
            state: job.label(),
            message,
        }
    }
}

/// JSON status for non-HTMX clients.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub state: &'static str,
    pub message: Option<String>,
}

impl From<&JobState> for StatusBody {
    fn from(job: &JobState) -> Self {
        let StatusTemplate { state, message } = StatusTemplate::from(job);
        Self { state, message }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub message: &'a str,
    pub status: u16,
}
