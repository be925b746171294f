#![allow(dead_code)]

use arimatrader::domain::error::ArimaTraderError;
pub use arimatrader::domain::ohlcv::OhlcvBar;
use arimatrader::domain::symbol::model_stem;
use arimatrader::domain::training::TrainedModel;
use arimatrader::ports::data_port::DataPort;
use arimatrader::ports::model_store::ModelStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ArimaTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ArimaTraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, ArimaTraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ArimaTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ArimaTraderError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Model store backed by a map, shareable across threads.
#[derive(Default)]
pub struct MemoryModelStore {
    pub models: Mutex<HashMap<String, TrainedModel>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.lock().unwrap().len()
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, model: &TrainedModel) -> Result<(), ArimaTraderError> {
        self.models
            .lock()
            .unwrap()
            .insert(model.symbol.clone(), model.clone());
        Ok(())
    }

    fn load(&self, symbol: &str) -> Result<TrainedModel, ArimaTraderError> {
        self.models
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| ArimaTraderError::ModelNotFound {
                symbol: symbol.to_string(),
                location: self.location(symbol),
            })
    }

    fn exists(&self, symbol: &str) -> bool {
        self.models.lock().unwrap().contains_key(symbol)
    }

    fn location(&self, symbol: &str) -> String {
        format!("memory:{}", model_stem(symbol))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Deterministic noise: sum of four uniforms on [-0.5, 0.5).
pub fn noise(seed: u64, n: usize) -> Vec<f64> {
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

pub fn make_bar(symbol: &str, date: NaiveDate, open: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        date,
        open,
        high: open.max(close) + 0.5,
        low: open.min(close) - 0.5,
        close,
        volume: 1_000,
    }
}

/// `n` daily bars starting at `start`: a noisy walk in the opens with a
/// constant `drift` per day.
pub fn walk_bars(
    symbol: &str,
    start: NaiveDate,
    n: usize,
    start_price: f64,
    drift: f64,
    seed: u64,
) -> Vec<OhlcvBar> {
    let mut level = start_price;
    noise(seed, n)
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            level += drift + e;
            let open = level;
            let close = level + drift / 2.0;
            make_bar(symbol, start + chrono::Duration::days(i as i64), open, close)
        })
        .collect()
}

pub fn write_price_file(dir: &Path, symbol: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("Date,Open,High,Low,Close,Volume,OpenInt\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{},0\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(dir.join(format!("{symbol}.txt")), content).unwrap();
}

/// Two-symbol INI: AAA and BBB train on January to March 2017 and the
/// backtest runs April to May.
pub fn two_symbol_ini(data_dir: &str, models_dir: &str) -> String {
    format!(
        "[data]
dir = {data_dir}

[models]
dir = {models_dir}

[symbols]
list = AAA,BBB

[symbol.aaa]
name = Alpha Corp
start = 2017-01-02
end = 2017-03-31

[symbol.bbb]
name = Beta Inc
start = 2017-01-02
end = 2017-03-31

[training]
max_p = 2
max_q = 2

[backtest]
start_date = 2017-04-01
end_date = 2017-05-31
initial_capital = 100000

[strategy]
cash_at_risk = 0.5
forecast_horizon = 5
"
    )
}

/// 150 bars per symbol, 2017-01-02 to 2017-05-31: AAA rises, BBB falls.
pub fn two_symbol_port() -> MockDataPort {
    MockDataPort::new()
        .with_bars("AAA", walk_bars("AAA", date(2017, 1, 2), 150, 100.0, 0.4, 7))
        .with_bars("BBB", walk_bars("BBB", date(2017, 1, 2), 150, 200.0, -0.3, 11))
}
