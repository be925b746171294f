//! ARIMA(p, d, q) fitted by conditional least squares.
//!
//! On the `d`-times differenced series `w` the model is
//! `w_t = c + Σ φ_i·w_{t-i} + Σ θ_j·e_{t-j} + e_t`.
//! Pure AR models are a single OLS regression. Models with an MA part use
//! the two-stage Hannan-Rissanen estimator: a long autoregression supplies
//! innovation estimates which then enter the second regression as regressors.
//!
//! Residuals are conditional: `e_t = 0` for `t < p`. The Gaussian
//! log-likelihood is evaluated over the full differenced length so that
//! information criteria stay comparable between candidate orders.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{difference, undifference};
use crate::domain::error::ModelError;

const SIGMA2_FLOOR: f64 = 1e-12;
const MAX_LONG_AR: usize = 10;
/// Residual variance above this multiple of the series variance marks a diverging fit.
const UNSTABLE_VARIANCE_RATIO: f64 = 1e4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaModel {
    pub order: ArimaOrder,
    pub with_intercept: bool,
    pub intercept: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub aicc: f64,
    pub bic: f64,
    /// Length of the differenced series the likelihood was evaluated on.
    pub nobs: usize,
    /// Series the model was fitted on, used by [`ArimaModel::predict`].
    pub train_series: Vec<f64>,
}

impl ArimaModel {
    /// Fit ARIMA(`order`) to `series`.
    pub fn fit(
        series: &[f64],
        order: ArimaOrder,
        with_intercept: bool,
    ) -> Result<Self, ModelError> {
        let ArimaOrder { p, d, q } = order;
        if let Some(bad) = series.iter().find(|v| !v.is_finite()) {
            return Err(ModelError::InvalidSeries {
                reason: format!("non-finite value {bad}"),
            });
        }

        let w = difference(series, d);
        let n = w.len();
        let icpt = usize::from(with_intercept);
        let too_short = |need_w: usize| ModelError::SeriesTooShort {
            p,
            d,
            q,
            have: series.len(),
            need: need_w + d,
        };

        let (intercept, ar, ma) = if q == 0 {
            let need_w = 2 * p + icpt + 2;
            if n < need_w {
                return Err(too_short(need_w));
            }
            if p == 0 && !with_intercept {
                (0.0, Vec::new(), Vec::new())
            } else {
                let rows: Vec<Vec<f64>> = (p..n)
                    .map(|t| {
                        let mut row = Vec::with_capacity(icpt + p);
                        if with_intercept {
                            row.push(1.0);
                        }
                        row.extend((1..=p).map(|i| w[t - i]));
                        row
                    })
                    .collect();
                let beta = least_squares(&rows, &w[p..]).ok_or(ModelError::Singular { p, d, q })?;
                split_coefficients(&beta, with_intercept, p)
            }
        } else {
            let m = (p + q).max(MAX_LONG_AR.min(n / 4));
            let need_w = (m + q + icpt + p + q + 2).max(2 * m + 3);
            if n < need_w {
                return Err(too_short(need_w));
            }

            let long_rows: Vec<Vec<f64>> = (m..n)
                .map(|t| {
                    let mut row = Vec::with_capacity(1 + m);
                    row.push(1.0);
                    row.extend((1..=m).map(|i| w[t - i]));
                    row
                })
                .collect();
            let long_beta =
                least_squares(&long_rows, &w[m..]).ok_or(ModelError::Singular { p, d, q })?;

            let mut innovations = vec![0.0; n];
            for (t, row) in (m..n).zip(&long_rows) {
                let fitted: f64 = row.iter().zip(long_beta.iter()).map(|(x, b)| x * b).sum();
                innovations[t] = w[t] - fitted;
            }

            let rows: Vec<Vec<f64>> = (m + q..n)
                .map(|t| {
                    let mut row = Vec::with_capacity(icpt + p + q);
                    if with_intercept {
                        row.push(1.0);
                    }
                    row.extend((1..=p).map(|i| w[t - i]));
                    row.extend((1..=q).map(|j| innovations[t - j]));
                    row
                })
                .collect();
            let beta = least_squares(&rows, &w[m + q..]).ok_or(ModelError::Singular { p, d, q })?;
            split_coefficients(&beta, with_intercept, p)
        };

        let residuals = conditional_residuals(&w, intercept, &ar, &ma);
        let tail = &residuals[p.min(n)..];
        if tail.is_empty() || tail.iter().any(|e| !e.is_finite()) {
            return Err(ModelError::Unstable { p, d, q });
        }
        let sigma2 =
            (tail.iter().map(|e| e * e).sum::<f64>() / tail.len() as f64).max(SIGMA2_FLOOR);
        let variance = sample_variance(&w);
        if variance > 0.0 && sigma2 > UNSTABLE_VARIANCE_RATIO * variance {
            return Err(ModelError::Unstable { p, d, q });
        }

        let nobs = n;
        let log_likelihood =
            -0.5 * nobs as f64 * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
        let k = (p + q + icpt + 1) as f64;
        let aic = -2.0 * log_likelihood + 2.0 * k;
        let aicc = if (nobs as f64) - k - 1.0 > 0.0 {
            aic + 2.0 * k * (k + 1.0) / (nobs as f64 - k - 1.0)
        } else {
            f64::INFINITY
        };
        let bic = -2.0 * log_likelihood + k * (nobs as f64).ln();

        Ok(Self {
            order,
            with_intercept,
            intercept,
            ar,
            ma,
            sigma2,
            log_likelihood,
            aic,
            aicc,
            bic,
            nobs,
            train_series: series.to_vec(),
        })
    }

    /// Forecast `horizon` values following the end of `history`.
    ///
    /// Innovations are re-estimated over `history`, so the same model can be
    /// rolled forward as new observations arrive.
    pub fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>, ModelError> {
        let ArimaOrder { p, d, .. } = self.order;
        if history.len() < d + p + 1 {
            return Err(ModelError::Forecast {
                reason: format!(
                    "{} needs at least {} observations, got {}",
                    self.order,
                    d + p + 1,
                    history.len()
                ),
            });
        }
        if horizon == 0 {
            return Ok(Vec::new());
        }

        let mut w = difference(history, d);
        let mut e = conditional_residuals(&w, self.intercept, &self.ar, &self.ma);
        let start = w.len();
        for _ in 0..horizon {
            let t = w.len();
            let mut next = self.intercept;
            for (i, phi) in self.ar.iter().enumerate() {
                next += phi * w[t - i - 1];
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if t > j {
                    next += theta * e[t - j - 1];
                }
            }
            w.push(next);
            e.push(0.0);
        }

        let out = undifference(&w[start..], history, d);
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Forecast {
                reason: format!("{} produced a non-finite forecast", self.order),
            });
        }
        Ok(out)
    }

    /// Forecast `horizon` values after the end of the training series.
    pub fn predict(&self, horizon: usize) -> Result<Vec<f64>, ModelError> {
        self.forecast(&self.train_series, horizon)
    }

    /// One-step-ahead forecast following `history`.
    pub fn next_value(&self, history: &[f64]) -> Result<f64, ModelError> {
        self.forecast(history, 1)?
            .first()
            .copied()
            .ok_or_else(|| ModelError::Forecast {
                reason: "empty forecast".into(),
            })
    }
}

fn split_coefficients(beta: &[f64], with_intercept: bool, p: usize) -> (f64, Vec<f64>, Vec<f64>) {
    let offset = usize::from(with_intercept);
    let intercept = if with_intercept { beta[0] } else { 0.0 };
    let ar = beta[offset..offset + p].to_vec();
    let ma = beta[offset + p..].to_vec();
    (intercept, ar, ma)
}

/// OLS via the normal equations; `None` when `XᵀX` is singular.
fn least_squares(rows: &[Vec<f64>], y: &[f64]) -> Option<Vec<f64>> {
    let cols = rows.first().map(|r| r.len())?;
    if cols == 0 || rows.len() < cols {
        return None;
    }
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let x = DMatrix::from_row_slice(rows.len(), cols, &flat);
    let y = DVector::from_column_slice(y);
    let xt = x.transpose();
    let xtx_inv = (&xt * &x).try_inverse()?;
    let beta = xtx_inv * (xt * y);
    if beta.iter().any(|b| !b.is_finite()) {
        return None;
    }
    Some(beta.iter().copied().collect())
}

/// Residuals of the ARMA recursion on `w`, zero for the first `p` points.
fn conditional_residuals(w: &[f64], intercept: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut e = vec![0.0; w.len()];
    for t in p..w.len() {
        let mut value = w[t] - intercept;
        for (i, phi) in ar.iter().enumerate() {
            value -= phi * w[t - i - 1];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                value -= theta * e[t - j - 1];
            }
        }
        e[t] = value;
    }
    e
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}
