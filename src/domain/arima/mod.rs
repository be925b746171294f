//! ARIMA forecasting: stationarity testing, conditional least-squares
//! fitting and stepwise order selection.
//!
//! - [`stationarity`]: ADF / KPSS tests and `ndiffs`
//! - [`model`]: `ArimaModel` fit and forecast
//! - [`auto`]: stepwise `auto_arima`

pub mod auto;
pub mod model;
pub mod stationarity;

pub use auto::{AutoArimaConfig, InformationCriterion, auto_arima};
pub use model::{ArimaModel, ArimaOrder};

/// Difference a series `d` times.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        if out.len() < 2 {
            return Vec::new();
        }
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Invert `d` rounds of differencing for values that continue `history`.
///
/// `forecast` holds values on the `d`-times differenced scale that follow
/// the end of `history`; the result is on the scale of `history`.
pub fn undifference(forecast: &[f64], history: &[f64], d: usize) -> Vec<f64> {
    let mut tails = Vec::with_capacity(d);
    let mut level = history.to_vec();
    for _ in 0..d {
        tails.push(level.last().copied().unwrap_or(0.0));
        level = difference(&level, 1);
    }

    let mut out = forecast.to_vec();
    for &tail in tails.iter().rev() {
        let mut acc = tail;
        out = out
            .iter()
            .map(|v| {
                acc += v;
                acc
            })
            .collect();
    }
    out
}

pub(crate) fn is_constant(series: &[f64]) -> bool {
    match series.first() {
        None => true,
        Some(&first) => series.iter().all(|v| (v - first).abs() < 1e-12),
    }
}

/// Deterministic noise for tests: each value is the sum of four uniforms on
/// [-0.5, 0.5), so variance is 1/3.
#[cfg(test)]
pub(crate) fn test_noise(seed: u64, n: usize) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            (0..4)
                .map(|_| {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn random_walk(seed: u64, n: usize, start: f64) -> Vec<f64> {
    let mut level = start;
    test_noise(seed, n)
        .into_iter()
        .map(|e| {
            level += e;
            level
        })
        .collect()
}
