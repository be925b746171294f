//! Symbol universe: tickers, display names and trading windows.
//!
//! A window's `start` bounds the default backtest; training reads the price
//! file from its first bar up to `end`.
//!
//! Iteration order of a [`SymbolUniverse`] is significant: best-symbol
//! selection breaks ties in favour of the earlier symbol.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::domain::error::ArimaTraderError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub ticker: String,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SymbolInfo {
    pub fn new(ticker: &str, name: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            start,
            end,
        }
    }

    /// File stem used for the symbol's model artifact.
    pub fn model_stem(&self) -> String {
        model_stem(&self.ticker)
    }
}

pub fn model_stem(ticker: &str) -> String {
    format!("arima_model_{}", ticker.to_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolUniverse {
    symbols: Vec<SymbolInfo>,
}

const DEFAULT_SYMBOLS: [(&str, &str, (i32, u32, u32)); 8] = [
    ("ACGL", "Arch Capital Group", (2015, 4, 29)),
    ("GOOG", "Google", (2017, 2, 21)),
    ("NVDA", "NVIDIA Corporation", (2014, 2, 11)),
    ("TSLA", "Tesla Inc.", (2016, 5, 23)),
    ("IEX", "IEX Group", (2015, 4, 30)),
    ("QCOM", "Qualcomm Inc.", (2012, 9, 5)),
    ("MCHP", "Microchip Technology", (2012, 12, 7)),
    ("AZN", "AstraZeneca PLC", (2015, 4, 30)),
];

const DEFAULT_END: (i32, u32, u32) = (2017, 11, 10);

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

impl SymbolUniverse {
    /// Build a universe, rejecting empty or duplicate tickers and inverted windows.
    pub fn new(symbols: Vec<SymbolInfo>) -> Result<Self, ArimaTraderError> {
        if symbols.is_empty() {
            return Err(ArimaTraderError::ConfigInvalid {
                section: "symbols".into(),
                key: "list".into(),
                reason: "at least one symbol is required".into(),
            });
        }
        let mut seen = HashSet::new();
        for s in &symbols {
            if s.ticker.trim().is_empty() {
                return Err(ArimaTraderError::ConfigInvalid {
                    section: "symbols".into(),
                    key: "list".into(),
                    reason: "empty ticker".into(),
                });
            }
            if !seen.insert(s.ticker.clone()) {
                return Err(ArimaTraderError::ConfigInvalid {
                    section: "symbols".into(),
                    key: "list".into(),
                    reason: format!("duplicate ticker {}", s.ticker),
                });
            }
            if s.start > s.end {
                return Err(ArimaTraderError::ConfigInvalid {
                    section: format!("symbol.{}", s.ticker),
                    key: "start".into(),
                    reason: "start must not be after end".into(),
                });
            }
        }
        Ok(Self { symbols })
    }

    pub fn default_universe() -> Self {
        let end = ymd(DEFAULT_END);
        Self {
            symbols: DEFAULT_SYMBOLS
                .iter()
                .map(|(ticker, name, start)| SymbolInfo::new(ticker, name, ymd(*start), end))
                .collect(),
        }
    }

    /// Read `[symbols] list` and the per-symbol `[symbol.T]` sections.
    ///
    /// Without a list the default universe is used. A listed ticker that is
    /// part of the default universe inherits its name and window unless the
    /// section overrides them; any other ticker needs explicit `start`/`end`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ArimaTraderError> {
        let list = match config.get_string("symbols", "list") {
            Some(l) if !l.trim().is_empty() => l,
            _ => return Ok(Self::default_universe()),
        };

        let defaults = Self::default_universe();
        let mut symbols = Vec::new();
        for token in list.split(',') {
            let ticker = token.trim().to_uppercase();
            if ticker.is_empty() {
                return Err(ArimaTraderError::ConfigInvalid {
                    section: "symbols".into(),
                    key: "list".into(),
                    reason: "empty token in symbol list".into(),
                });
            }
            let section = format!("symbol.{}", ticker.to_lowercase());
            let fallback = defaults.get(&ticker);

            let name = config
                .get_string(&section, "name")
                .or_else(|| fallback.map(|f| f.name.clone()))
                .unwrap_or_else(|| ticker.clone());
            let start = match config.get_date(&section, "start")? {
                Some(d) => d,
                None => fallback.map(|f| f.start).ok_or_else(|| {
                    ArimaTraderError::ConfigMissing {
                        section: section.clone(),
                        key: "start".into(),
                    }
                })?,
            };
            let end = match config.get_date(&section, "end")? {
                Some(d) => d,
                None => fallback.map(|f| f.end).ok_or_else(|| {
                    ArimaTraderError::ConfigMissing {
                        section: section.clone(),
                        key: "end".into(),
                    }
                })?,
            };
            symbols.push(SymbolInfo {
                ticker,
                name,
                start,
                end,
            });
        }
        Self::new(symbols)
    }

    pub fn symbols(&self) -> &[SymbolInfo] {
        &self.symbols
    }

    pub fn tickers(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.ticker.clone()).collect()
    }

    pub fn get(&self, ticker: &str) -> Option<&SymbolInfo> {
        self.symbols.iter().find(|s| s.ticker == ticker)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Keep only `ticker`, for single-symbol commands.
    pub fn restrict_to(&self, ticker: &str) -> Result<Self, ArimaTraderError> {
        let ticker = ticker.trim().to_uppercase();
        match self.get(&ticker) {
            Some(info) => Ok(Self {
                symbols: vec![info.clone()],
            }),
            None => Err(ArimaTraderError::ConfigInvalid {
                section: "symbols".into(),
                key: "list".into(),
                reason: format!("{ticker} is not part of the configured universe"),
            }),
        }
    }

    /// Earliest start and latest end across all symbols.
    pub fn backtest_window(&self) -> (NaiveDate, NaiveDate) {
        let start = self.symbols.iter().map(|s| s.start).min();
        let end = self.symbols.iter().map(|s| s.end).max();
        match (start, end) {
            (Some(s), Some(e)) => (s, e),
            _ => (NaiveDate::MIN, NaiveDate::MIN),
        }
    }
}
