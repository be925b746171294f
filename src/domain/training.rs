//! Offline per-symbol model training.
//!
//! Each symbol is trained independently: features are derived, the first
//! `train_fraction` of the bars becomes the training sample, the differencing
//! order is estimated from the `Open` series and the stepwise search picks
//! (p, q). The held-out tail is scored with rolling one-step forecasts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::arima::stationarity::estimate_d;
use crate::domain::arima::{ArimaModel, AutoArimaConfig, InformationCriterion, auto_arima};
use crate::domain::error::ArimaTraderError;
use crate::domain::features::add_features;
use crate::domain::ohlcv::{OhlcvBar, opens};
use crate::domain::symbol::{SymbolInfo, SymbolUniverse};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::model_store::ModelStore;

/// Bars required before a symbol is worth training.
pub const MIN_TRAINING_BARS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub train_fraction: f64,
    pub alpha: f64,
    pub max_d: usize,
    pub search: AutoArimaConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            alpha: 0.05,
            max_d: 6,
            search: AutoArimaConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Read the `[training]` section. Range checks live in `config_validation`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ArimaTraderError> {
        let defaults = Self::default();
        let criterion = match config.get_string("training", "criterion") {
            Some(raw) => raw
                .parse::<InformationCriterion>()
                .map_err(|reason| ArimaTraderError::ConfigInvalid {
                    section: "training".into(),
                    key: "criterion".into(),
                    reason,
                })?,
            None => defaults.search.criterion,
        };
        let non_negative = |key: &str, default: usize| -> Result<usize, ArimaTraderError> {
            let value = config.get_int("training", key, default as i64);
            usize::try_from(value).map_err(|_| ArimaTraderError::ConfigInvalid {
                section: "training".into(),
                key: key.to_string(),
                reason: "must be non-negative".into(),
            })
        };
        Ok(Self {
            train_fraction: config.get_double(
                "training",
                "train_fraction",
                defaults.train_fraction,
            ),
            alpha: config.get_double("training", "alpha", defaults.alpha),
            max_d: non_negative("max_d", defaults.max_d)?,
            search: AutoArimaConfig {
                max_p: non_negative("max_p", defaults.search.max_p)?,
                max_q: non_negative("max_q", defaults.search.max_q)?,
                criterion,
            },
        })
    }
}

/// Out-of-sample accuracy of rolling one-step forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub points: usize,
    pub rmse: f64,
    /// Mean absolute percentage error in percent, `None` when every actual was zero.
    pub mape: Option<f64>,
}

/// A fitted model plus the metadata needed to use and describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub symbol: String,
    pub name: String,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub train_bars: usize,
    pub model: ArimaModel,
    pub evaluation: Option<Evaluation>,
}

/// Train a model for `info` from its bars.
pub fn train_symbol(
    info: &SymbolInfo,
    bars: Vec<OhlcvBar>,
    config: &TrainingConfig,
) -> Result<TrainedModel, ArimaTraderError> {
    if bars.len() < MIN_TRAINING_BARS {
        return Err(ArimaTraderError::InsufficientData {
            symbol: info.ticker.clone(),
            bars: bars.len(),
            minimum: MIN_TRAINING_BARS,
        });
    }

    let frame = add_features(bars);
    let (train, test) = frame.split(config.train_fraction);
    debug!(
        symbol = %info.ticker,
        features = frame.columns.len(),
        train = train.len(),
        test = test.len(),
        "feature frame built"
    );

    let series = train.opens();
    let d = estimate_d(&series, config.alpha, config.max_d);
    let model = auto_arima(&series, d, &config.search)
        .map_err(|e| ArimaTraderError::model(&info.ticker, e))?;

    let all_opens = frame.opens();
    let evaluation = evaluate(&model, &all_opens, train.len());

    let (train_start, train_end) = match (train.bars.first(), train.bars.last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => (info.start, info.end),
    };

    info!(
        symbol = %info.ticker,
        order = %model.order,
        intercept = model.with_intercept,
        aic = model.aic,
        rmse = evaluation.as_ref().map(|e| e.rmse),
        "model trained"
    );

    Ok(TrainedModel {
        symbol: info.ticker.clone(),
        name: info.name.clone(),
        train_start,
        train_end,
        train_bars: train.len(),
        model,
        evaluation,
    })
}

/// Score rolling one-step forecasts of `series[cut..]`, each conditioned on
/// everything before it. Points whose forecast fails are left out.
pub fn evaluate(model: &ArimaModel, series: &[f64], cut: usize) -> Option<Evaluation> {
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_points = 0usize;
    let mut points = 0usize;

    for t in cut..series.len() {
        let Ok(predicted) = model.next_value(&series[..t]) else {
            continue;
        };
        let actual = series[t];
        let err = predicted - actual;
        sq_sum += err * err;
        if actual != 0.0 {
            pct_sum += (err / actual).abs();
            pct_points += 1;
        }
        points += 1;
    }

    if points == 0 {
        return None;
    }
    Some(Evaluation {
        points,
        rmse: (sq_sum / points as f64).sqrt(),
        mape: (pct_points > 0).then(|| 100.0 * pct_sum / pct_points as f64),
    })
}

/// Outcome of training a whole universe.
#[derive(Debug, Default)]
pub struct TrainingSummary {
    pub trained: Vec<TrainedModel>,
    pub failed: Vec<(String, ArimaTraderError)>,
}

impl TrainingSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Train and persist every symbol of `universe`. A failing symbol is logged
/// and recorded; the rest still train.
pub fn train_universe(
    universe: &SymbolUniverse,
    data: &dyn DataPort,
    store: &dyn ModelStore,
    config: &TrainingConfig,
) -> TrainingSummary {
    let mut summary = TrainingSummary::default();

    for info in universe.symbols() {
        info!(symbol = %info.ticker, end = %info.end, "training");
        // everything in the price file up to the window end; `start` only bounds the backtest
        let result = data
            .fetch_ohlcv(&info.ticker, NaiveDate::MIN, info.end)
            .and_then(|bars| train_symbol(info, validate_bars(info, bars)?, config))
            .and_then(|trained| store.save(&trained).map(|()| trained));

        match result {
            Ok(trained) => {
                info!(
                    symbol = %trained.symbol,
                    location = %store.location(&trained.symbol),
                    "model saved"
                );
                summary.trained.push(trained);
            }
            Err(e) => {
                warn!(symbol = %info.ticker, error = %e, "training failed");
                summary.failed.push((info.ticker.clone(), e));
            }
        }
    }

    summary
}

fn validate_bars(
    info: &SymbolInfo,
    bars: Vec<OhlcvBar>,
) -> Result<Vec<OhlcvBar>, ArimaTraderError> {
    if bars.is_empty() {
        return Err(ArimaTraderError::NoData {
            symbol: info.ticker.clone(),
        });
    }
    if let Some(bad) = opens(&bars).iter().find(|v| !v.is_finite() || **v <= 0.0) {
        return Err(ArimaTraderError::Data {
            reason: format!("{}: invalid open price {bad}", info.ticker),
        });
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::arima::{ArimaOrder, random_walk};

    fn info() -> SymbolInfo {
        SymbolInfo::new(
            "TEST",
            "Test Corp",
            NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2017, 12, 31).unwrap(),
        )
    }

    fn bars_from(prices: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2016, 1, 4).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| OhlcvBar {
                symbol: "TEST".into(),
                date: start + chrono::Duration::days(i as i64),
                open: p,
                high: p * 1.01,
                low: p * 0.99,
                close: p,
                volume: 1000 + i as i64,
            })
            .collect()
    }

    #[test]
    fn trains_random_walk() {
        let prices = random_walk(3, 300, 100.0);
        let trained =
            train_symbol(&info(), bars_from(&prices), &TrainingConfig::default()).unwrap();
        assert_eq!(trained.symbol, "TEST");
        assert_eq!(trained.train_bars, 240);
        assert_eq!(trained.model.order.d, 1);
        assert_eq!(trained.model.train_series.len(), 240);
        assert_eq!(trained.train_start, NaiveDate::from_ymd_opt(2016, 1, 4).unwrap());
        let eval = trained.evaluation.unwrap();
        assert_eq!(eval.points, 60);
        assert!(eval.rmse > 0.0 && eval.rmse < 2.0);
    }

    #[test]
    fn too_few_bars_is_insufficient() {
        let err =
            train_symbol(&info(), bars_from(&[1.0; 10]), &TrainingConfig::default()).unwrap_err();
        assert!(matches!(err, ArimaTraderError::InsufficientData { bars: 10, .. }));
    }

    #[test]
    fn evaluate_scores_perfect_trend() {
        let series: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let model = ArimaModel::fit(&series[..40], ArimaOrder::new(0, 1, 0), true).unwrap();
        let eval = evaluate(&model, &series, 40).unwrap();
        assert_eq!(eval.points, 10);
        assert!(eval.rmse < 1e-9);
        assert!(eval.mape.unwrap() < 1e-9);
    }

    #[test]
    fn evaluate_without_holdout_is_none() {
        let series: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let model = ArimaModel::fit(&series, ArimaOrder::new(0, 1, 0), true).unwrap();
        assert!(evaluate(&model, &series, 20).is_none());
    }

    #[test]
    fn config_from_ini() {
        let ini = "[training]\ntrain_fraction = 0.75\nmax_p = 3\ncriterion = bic\n";
        let cfg = FileConfigAdapter::from_string(ini).unwrap();
        let tc = TrainingConfig::from_config(&cfg).unwrap();
        assert_eq!(tc.train_fraction, 0.75);
        assert_eq!(tc.search.max_p, 3);
        assert_eq!(tc.search.max_q, 5);
        assert_eq!(tc.search.criterion, InformationCriterion::Bic);
    }

    #[test]
    fn config_rejects_unknown_criterion() {
        let cfg = FileConfigAdapter::from_string("[training]\ncriterion = hqic\n").unwrap();
        assert!(TrainingConfig::from_config(&cfg).is_err());
    }

    #[test]
    fn config_rejects_negative_order() {
        let cfg = FileConfigAdapter::from_string("[training]\nmax_q = -1\n").unwrap();
        assert!(TrainingConfig::from_config(&cfg).is_err());
    }
}
