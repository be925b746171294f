//! Best-symbol selection by predicted percentage change.

use tracing::debug;

use crate::domain::arima::ArimaModel;
use crate::domain::error::{ArimaTraderError, ModelError};

/// Forecast for one symbol relative to its last price.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub symbol: String,
    pub pct_change: f64,
    pub last_price: f64,
}

/// `(forecast[h-1] - last_price) / last_price` for an `horizon`-step forecast.
pub fn forecast_pct_change(
    model: &ArimaModel,
    history: &[f64],
    last_price: f64,
    horizon: usize,
) -> Result<f64, ModelError> {
    if !last_price.is_finite() || last_price <= 0.0 {
        return Err(ModelError::Forecast {
            reason: format!("invalid last price {last_price}"),
        });
    }
    let forecast = model.forecast(history, horizon)?;
    let target = forecast.last().copied().ok_or_else(|| ModelError::Forecast {
        reason: "empty forecast".into(),
    })?;
    let change = (target - last_price) / last_price;
    if !change.is_finite() {
        return Err(ModelError::Forecast {
            reason: format!("non-finite change from {target}"),
        });
    }
    Ok(change)
}

/// Pick the candidate with the strictly largest absolute change.
///
/// Candidates are visited in order, so ties go to the earlier symbol. Failed
/// forecasts are skipped and a zero change never wins.
pub fn select_best<I>(candidates: I) -> Option<Selection>
where
    I: IntoIterator<Item = Result<Selection, ArimaTraderError>>,
{
    let mut best: Option<Selection> = None;
    for candidate in candidates {
        let candidate = match candidate {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "skipping symbol");
                continue;
            }
        };
        let best_abs = best.as_ref().map_or(0.0, |b| b.pct_change.abs());
        if candidate.pct_change.abs() > best_abs {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::arima::ArimaOrder;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn sel(symbol: &str, pct_change: f64) -> Result<Selection, ArimaTraderError> {
        Ok(Selection {
            symbol: symbol.into(),
            pct_change,
            last_price: 100.0,
        })
    }

    fn failed(symbol: &str) -> Result<Selection, ArimaTraderError> {
        Err(ArimaTraderError::model(symbol, ModelError::NoCandidate))
    }

    #[test]
    fn largest_absolute_change_wins() {
        let best = select_best(vec![sel("A", 0.01), sel("B", -0.05), sel("C", 0.03)]).unwrap();
        assert_eq!(best.symbol, "B");
    }

    #[test]
    fn ties_keep_earlier_symbol() {
        let best = select_best(vec![sel("A", 0.02), sel("B", -0.02), sel("C", 0.02)]).unwrap();
        assert_eq!(best.symbol, "A");
    }

    #[test]
    fn failures_are_skipped() {
        let best = select_best(vec![failed("A"), sel("B", 0.001)]).unwrap();
        assert_eq!(best.symbol, "B");
    }

    #[test]
    fn zero_change_is_never_selected() {
        assert!(select_best(vec![sel("A", 0.0), sel("B", -0.0)]).is_none());
        assert!(select_best(Vec::new()).is_none());
        assert!(select_best(vec![failed("A")]).is_none());
    }

    #[test]
    fn pct_change_from_drift_model() {
        let series: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let model = ArimaModel::fit(&series, ArimaOrder::new(0, 1, 0), true).unwrap();
        let change = forecast_pct_change(&model, &series, 129.0, 5).unwrap();
        assert_relative_eq!(change, 5.0 / 129.0, epsilon = 1e-9);
    }

    #[test]
    fn pct_change_rejects_zero_price() {
        let series: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let model = ArimaModel::fit(&series, ArimaOrder::new(0, 1, 0), true).unwrap();
        assert!(forecast_pct_change(&model, &series, 0.0, 5).is_err());
    }

    proptest! {
        #[test]
        fn selected_change_dominates(changes in proptest::collection::vec(-1.0f64..1.0, 0..12)) {
            let candidates: Vec<_> = changes
                .iter()
                .enumerate()
                .map(|(i, &c)| sel(&format!("S{i}"), c))
                .collect();
            match select_best(candidates) {
                Some(best) => {
                    let idx: usize = best.symbol[1..].parse().unwrap();
                    for (i, c) in changes.iter().enumerate() {
                        prop_assert!(c.abs() <= best.pct_change.abs());
                        if i < idx {
                            prop_assert!(c.abs() < best.pct_change.abs());
                        }
                    }
                }
                None => prop_assert!(changes.iter().all(|c| *c == 0.0)),
            }
        }
    }
}
