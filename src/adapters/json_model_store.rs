//! Model artifacts as pretty-printed JSON files, one per symbol.

use std::fs;
use std::path::PathBuf;

use crate::domain::error::ArimaTraderError;
use crate::domain::symbol::model_stem;
use crate::domain::training::TrainedModel;
use crate::ports::model_store::ModelStore;

pub struct JsonModelStore {
    dir: PathBuf,
}

impl JsonModelStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.json", model_stem(symbol)))
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, model: &TrainedModel) -> Result<(), ArimaTraderError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&model.symbol);
        let json = serde_json::to_string_pretty(model).map_err(|e| ArimaTraderError::ModelFormat {
            location: path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(&path, json)?;
        Ok(())
    }

    fn load(&self, symbol: &str) -> Result<TrainedModel, ArimaTraderError> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return Err(ArimaTraderError::ModelNotFound {
                symbol: symbol.to_string(),
                location: path.display().to_string(),
            });
        }
        let json = fs::read_to_string(&path)?;
        serde_json::from_str(&json).map_err(|e| ArimaTraderError::ModelFormat {
            location: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn exists(&self, symbol: &str) -> bool {
        self.path_for(symbol).is_file()
    }

    fn location(&self, symbol: &str) -> String {
        self.path_for(symbol).display().to_string()
    }
}
