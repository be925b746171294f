//! Lagged rolling-window covariates.
//!
//! For each of High, Low and Volume and each window of 3, 7 and 30 bars the
//! trailing mean and sample standard deviation are computed. Windows are
//! partial at the start of the series: row `i` covers rows
//! `max(0, i + 1 - w)..=i`. The mean is therefore defined from the first row,
//! the standard deviation (ddof = 1) only once the window holds two values.

use crate::domain::ohlcv::OhlcvBar;

pub const WINDOWS: [usize; 3] = [3, 7, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagFeature {
    High,
    Low,
    Volume,
}

pub const LAG_FEATURES: [LagFeature; 3] = [LagFeature::High, LagFeature::Low, LagFeature::Volume];

impl LagFeature {
    pub fn name(&self) -> &'static str {
        match self {
            LagFeature::High => "High",
            LagFeature::Low => "Low",
            LagFeature::Volume => "Volume",
        }
    }

    fn extract(&self, bar: &OhlcvBar) -> f64 {
        match self {
            LagFeature::High => bar.high,
            LagFeature::Low => bar.low,
            LagFeature::Volume => bar.volume as f64,
        }
    }
}

/// Canonical exogenous feature column order.
pub const EXOGENOUS_FEATURES: [&str; 18] = [
    "High_mean_lag3",
    "High_std_lag3",
    "Low_mean_lag3",
    "Low_std_lag3",
    "Volume_mean_lag3",
    "Volume_std_lag3",
    "High_mean_lag7",
    "High_std_lag7",
    "Low_mean_lag7",
    "Low_std_lag7",
    "Volume_mean_lag7",
    "Volume_std_lag7",
    "High_mean_lag30",
    "High_std_lag30",
    "Low_mean_lag30",
    "Low_std_lag30",
    "Volume_mean_lag30",
    "Volume_std_lag30",
];

pub fn feature_name(feature: LagFeature, stat: &str, window: usize) -> String {
    format!("{}_{}_lag{}", feature.name(), stat, window)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Bars plus their derived feature columns, row-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub bars: Vec<OhlcvBar>,
    pub columns: Vec<FeatureColumn>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Exogenous feature values for row `i`, in [`EXOGENOUS_FEATURES`] order.
    pub fn row(&self, i: usize) -> Option<Vec<Option<f64>>> {
        if i >= self.len() {
            return None;
        }
        EXOGENOUS_FEATURES
            .iter()
            .map(|name| self.column(name).map(|c| c[i]))
            .collect()
    }

    /// Split at `floor(len * fraction)` into (train, test), keeping rows aligned.
    pub fn split(&self, fraction: f64) -> (FeatureFrame, FeatureFrame) {
        let cut = ((self.len() as f64) * fraction).floor() as usize;
        let cut = cut.min(self.len());
        let part = |range: std::ops::Range<usize>| FeatureFrame {
            bars: self.bars[range.clone()].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| FeatureColumn {
                    name: c.name.clone(),
                    values: c.values[range.clone()].to_vec(),
                })
                .collect(),
        };
        (part(0..cut), part(cut..self.len()))
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }
}

/// Trailing mean over partial windows.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let w = &values[window_start(i, window)..=i];
            Some(w.iter().sum::<f64>() / w.len() as f64)
        })
        .collect()
}

/// Trailing sample standard deviation over partial windows.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let w = &values[window_start(i, window)..=i];
            if w.len() < 2 {
                return None;
            }
            let n = w.len() as f64;
            let mean = w.iter().sum::<f64>() / n;
            let ss: f64 = w.iter().map(|v| (v - mean).powi(2)).sum();
            Some((ss / (n - 1.0)).sqrt())
        })
        .collect()
}

fn window_start(i: usize, window: usize) -> usize {
    (i + 1).saturating_sub(window.max(1))
}

/// Derive the 18 exogenous feature columns for `bars`.
pub fn add_features(bars: Vec<OhlcvBar>) -> FeatureFrame {
    let mut columns = Vec::with_capacity(EXOGENOUS_FEATURES.len());

    for &window in &WINDOWS {
        for feature in LAG_FEATURES {
            let raw: Vec<f64> = bars.iter().map(|b| feature.extract(b)).collect();
            columns.push(FeatureColumn {
                name: feature_name(feature, "mean", window),
                values: rolling_mean(&raw, window),
            });
            columns.push(FeatureColumn {
                name: feature_name(feature, "std", window),
                values: rolling_std(&raw, window),
            });
        }
    }

    FeatureFrame { bars, columns }
}
