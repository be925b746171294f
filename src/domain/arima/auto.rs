//! Stepwise order search (Hyndman-Khandakar).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::model::{ArimaModel, ArimaOrder};
use crate::domain::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InformationCriterion {
    #[default]
    Aic,
    Aicc,
    Bic,
}

impl InformationCriterion {
    pub fn score(&self, model: &ArimaModel) -> f64 {
        match self {
            InformationCriterion::Aic => model.aic,
            InformationCriterion::Aicc => model.aicc,
            InformationCriterion::Bic => model.bic,
        }
    }
}

impl fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InformationCriterion::Aic => "aic",
            InformationCriterion::Aicc => "aicc",
            InformationCriterion::Bic => "bic",
        };
        f.write_str(name)
    }
}

impl FromStr for InformationCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aic" => Ok(InformationCriterion::Aic),
            "aicc" => Ok(InformationCriterion::Aicc),
            "bic" => Ok(InformationCriterion::Bic),
            other => Err(format!("unknown information criterion '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoArimaConfig {
    pub max_p: usize,
    pub max_q: usize,
    pub criterion: InformationCriterion,
}

impl Default for AutoArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 6,
            max_q: 5,
            criterion: InformationCriterion::Aic,
        }
    }
}

const START_ORDERS: [(usize, usize); 4] = [(2, 2), (0, 0), (1, 0), (0, 1)];
const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
];

struct Search<'a> {
    series: &'a [f64],
    d: usize,
    config: &'a AutoArimaConfig,
    visited: HashMap<(usize, usize, bool), Option<(f64, ArimaModel)>>,
}

impl Search<'_> {
    /// Fit (or recall) a candidate; failed fits are remembered as `None`.
    fn candidate(&mut self, p: usize, q: usize, intercept: bool) -> Option<(f64, ArimaModel)> {
        let key = (p, q, intercept);
        if let Some(cached) = self.visited.get(&key) {
            return cached.clone();
        }
        let order = ArimaOrder::new(p, self.d, q);
        let result = match ArimaModel::fit(self.series, order, intercept) {
            Ok(model) => {
                let score = self.config.criterion.score(&model);
                debug!(%order, intercept, score, "candidate fitted");
                score.is_finite().then_some((score, model))
            }
            Err(e) => {
                debug!(%order, intercept, error = %e, "candidate skipped");
                None
            }
        };
        self.visited.insert(key, result.clone());
        result
    }

    fn within_bounds(&self, p: isize, q: isize) -> bool {
        p >= 0 && q >= 0 && p as usize <= self.config.max_p && q as usize <= self.config.max_q
    }
}

/// Stepwise search over (p, q, intercept) for a fixed differencing order `d`.
///
/// Starts from the best of ARIMA(2,d,2), (0,d,0), (1,d,0) and (0,d,1), then
/// moves to the first neighbour that lowers the criterion until none does.
/// The intercept is included by default when `d < 2` and toggled as a final
/// move in that case.
pub fn auto_arima(
    series: &[f64],
    d: usize,
    config: &AutoArimaConfig,
) -> Result<ArimaModel, ModelError> {
    let mut search = Search {
        series,
        d,
        config,
        visited: HashMap::new(),
    };
    let allow_intercept = d < 2;

    let mut best: Option<(f64, ArimaModel)> = None;
    for (p, q) in START_ORDERS {
        if p > config.max_p || q > config.max_q {
            continue;
        }
        if let Some((score, model)) = search.candidate(p, q, allow_intercept) {
            if best.as_ref().is_none_or(|(b, _)| score < *b) {
                best = Some((score, model));
            }
        }
    }
    let (mut best_score, mut best_model) = best.ok_or(ModelError::NoCandidate)?;

    loop {
        let p = best_model.order.p as isize;
        let q = best_model.order.q as isize;
        let intercept = best_model.with_intercept;
        let mut improved = false;

        for (dp, dq) in NEIGHBOURS {
            let (np, nq) = (p + dp, q + dq);
            if !search.within_bounds(np, nq) {
                continue;
            }
            if let Some((score, model)) = search.candidate(np as usize, nq as usize, intercept) {
                if score < best_score {
                    best_score = score;
                    best_model = model;
                    improved = true;
                    break;
                }
            }
        }

        if !improved && allow_intercept {
            if let Some((score, model)) = search.candidate(p as usize, q as usize, !intercept) {
                if score < best_score {
                    best_score = score;
                    best_model = model;
                    improved = true;
                }
            }
        }

        if !improved {
            break;
        }
    }

    debug!(
        order = %best_model.order,
        intercept = best_model.with_intercept,
        score = best_score,
        criterion = %config.criterion,
        candidates = search.visited.len(),
        "stepwise search finished"
    );
    Ok(best_model)
}
