//! Trained model persistence port.

use crate::domain::error::ArimaTraderError;
use crate::domain::training::TrainedModel;

pub trait ModelStore {
    fn save(&self, model: &TrainedModel) -> Result<(), ArimaTraderError>;

    /// Load the model for `symbol`; `ModelNotFound` when none was saved.
    fn load(&self, symbol: &str) -> Result<TrainedModel, ArimaTraderError>;

    fn exists(&self, symbol: &str) -> bool;

    /// Human-readable location of the artifact for `symbol`.
    fn location(&self, symbol: &str) -> String;

    /// Symbols from `symbols` with no stored model, in input order.
    fn missing(&self, symbols: &[String]) -> Vec<String> {
        symbols
            .iter()
            .filter(|s| !self.exists(s))
            .cloned()
            .collect()
    }
}
