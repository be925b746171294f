//! Unit-root and stationarity tests, and differencing order estimation.
//!
//! ADF: H0 = unit root. The regression
//! `Δy_t = α + β·y_{t-1} + Σ γ_i·Δy_{t-i} + ε_t` uses `k = ⌊(n-1)^{1/3}⌋`
//! lags; the statistic is the t-ratio of β. p-values interpolate the
//! asymptotic τ_μ quantiles and are clamped to [0.01, 0.99].
//!
//! KPSS (level): H0 = stationary. Long-run variance uses Bartlett weights
//! with `l = ⌊3·√n / 13⌋` lags; p-values interpolate the level critical
//! values and are clamped to [0.01, 0.10].

use nalgebra::{DMatrix, DVector};

use super::{difference, is_constant};

const MIN_TEST_OBS: usize = 10;

/// (statistic, p-value) pairs for τ_μ, ascending.
const ADF_TABLE: [(f64, f64); 8] = [
    (-3.43, 0.01),
    (-3.12, 0.025),
    (-2.86, 0.05),
    (-2.57, 0.10),
    (-0.44, 0.90),
    (-0.07, 0.95),
    (0.23, 0.975),
    (0.60, 0.99),
];

/// (statistic, p-value) pairs for the level KPSS test, ascending.
const KPSS_TABLE: [(f64, f64); 4] = [(0.347, 0.10), (0.463, 0.05), (0.574, 0.025), (0.739, 0.01)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationarityTest {
    Adf,
    Kpss,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub lags: usize,
}

impl StationarityTest {
    pub fn run(&self, series: &[f64]) -> TestResult {
        match self {
            StationarityTest::Adf => adf_test(series, None),
            StationarityTest::Kpss => kpss_test(series),
        }
    }

    /// Whether the test suggests the series needs (another) difference at `alpha`.
    pub fn should_diff(&self, series: &[f64], alpha: f64) -> bool {
        let result = self.run(series);
        match self {
            StationarityTest::Adf => result.p_value > alpha,
            StationarityTest::Kpss => result.p_value < alpha,
        }
    }
}

fn interpolate(table: &[(f64, f64)], x: f64) -> f64 {
    let (first_x, first_p) = table[0];
    let (last_x, last_p) = table[table.len() - 1];
    if x <= first_x {
        return first_p;
    }
    if x >= last_x {
        return last_p;
    }
    for pair in table.windows(2) {
        let (x0, p0) = pair[0];
        let (x1, p1) = pair[1];
        if x >= x0 && x <= x1 {
            return p0 + (p1 - p0) * (x - x0) / (x1 - x0);
        }
    }
    last_p
}

fn inconclusive_adf(lags: usize) -> TestResult {
    TestResult {
        statistic: f64::NAN,
        p_value: 1.0,
        lags,
    }
}

/// Augmented Dickey-Fuller test with a constant.
pub fn adf_test(series: &[f64], max_lag: Option<usize>) -> TestResult {
    let n = series.len();
    if n < MIN_TEST_OBS {
        return inconclusive_adf(0);
    }

    let k = max_lag.unwrap_or_else(|| ((n - 1) as f64).cbrt().floor() as usize);
    let dy = difference(series, 1);
    let rows = (n - 1).saturating_sub(k);
    let cols = 2 + k;
    if rows <= cols + 1 {
        return inconclusive_adf(k);
    }

    let mut x_data = Vec::with_capacity(rows * cols);
    let mut y_data = Vec::with_capacity(rows);
    for j in k..n - 1 {
        x_data.push(1.0);
        x_data.push(series[j]);
        for i in 1..=k {
            x_data.push(dy[j - i]);
        }
        y_data.push(dy[j]);
    }

    let x = DMatrix::from_row_slice(rows, cols, &x_data);
    let y = DVector::from_vec(y_data);
    let xtx = x.transpose() * &x;
    let Some(xtx_inv) = xtx.try_inverse() else {
        return inconclusive_adf(k);
    };
    let beta = &xtx_inv * (x.transpose() * &y);

    let residuals = &y - &x * &beta;
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    let mse = sse / (rows - cols) as f64;
    let se = (mse * xtx_inv[(1, 1)]).sqrt();
    if !se.is_finite() || se <= 0.0 {
        return inconclusive_adf(k);
    }

    let statistic = beta[1] / se;
    TestResult {
        statistic,
        p_value: interpolate(&ADF_TABLE, statistic),
        lags: k,
    }
}

/// KPSS test for level stationarity.
pub fn kpss_test(series: &[f64]) -> TestResult {
    let n = series.len();
    let lags = ((3.0 * (n as f64).sqrt()) / 13.0).floor() as usize;
    if n < MIN_TEST_OBS || is_constant(series) {
        return TestResult {
            statistic: 0.0,
            p_value: 0.10,
            lags,
        };
    }

    let mean = series.iter().sum::<f64>() / n as f64;
    let resid: Vec<f64> = series.iter().map(|v| v - mean).collect();

    let mut s2 = resid.iter().map(|r| r * r).sum::<f64>() / n as f64;
    for l in 1..=lags.min(n - 1) {
        let weight = 1.0 - l as f64 / (lags + 1) as f64;
        let gamma: f64 = resid[l..]
            .iter()
            .zip(resid[..n - l].iter())
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        s2 += 2.0 * weight * gamma;
    }

    let mut partial = 0.0;
    let mut sum_sq = 0.0;
    for r in &resid {
        partial += r;
        sum_sq += partial * partial;
    }
    let statistic = sum_sq / ((n * n) as f64 * s2);

    // KPSS p-values fall as the statistic grows; the table is ascending in x.
    let p_value = if statistic.is_finite() {
        interpolate(&KPSS_TABLE, statistic)
    } else {
        0.01
    };

    TestResult {
        statistic,
        p_value,
        lags,
    }
}

/// Estimate the number of differences needed to make `series` stationary.
pub fn ndiffs(series: &[f64], alpha: f64, test: StationarityTest, max_d: usize) -> usize {
    if is_constant(series) {
        return 0;
    }

    let mut d = 0;
    let mut x = series.to_vec();
    while d < max_d && test.should_diff(&x, alpha) {
        d += 1;
        x = difference(&x, 1);
        if is_constant(&x) || x.len() < MIN_TEST_OBS {
            break;
        }
    }
    d
}

/// Differencing order used for training: the larger of the ADF and KPSS estimates.
pub fn estimate_d(series: &[f64], alpha: f64, max_d: usize) -> usize {
    let adf = ndiffs(series, alpha, StationarityTest::Adf, max_d);
    let kpss = ndiffs(series, alpha, StationarityTest::Kpss, max_d);
    adf.max(kpss)
}
