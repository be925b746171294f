//! CSV price-file adapter.
//!
//! One file per symbol, `{TICKER}.txt` or `{TICKER}.csv`, with a header row.
//! Columns are located by name (case-insensitive); extra columns such as
//! `OpenInt` are ignored.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::error::ArimaTraderError;
use crate::domain::features::FeatureFrame;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;

const EXTENSIONS: [&str; 2] = ["txt", "csv"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord, path: &Path) -> Result<Self, ArimaTraderError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| ArimaTraderError::Data {
                    reason: format!("{}: missing column {name}", path.display()),
                })
        };
        Ok(Self {
            date: find("date")?,
            open: find("open")?,
            high: find("high")?,
            low: find("low")?,
            close: find("close")?,
            volume: find("volume")?,
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Existing price file for `symbol`, preferring `.txt`.
    pub fn file_for(&self, symbol: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.base_path.join(format!("{symbol}.{ext}")))
            .find(|p| p.is_file())
    }

    fn read_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, ArimaTraderError> {
        let path = self.file_for(symbol).ok_or_else(|| ArimaTraderError::NoData {
            symbol: symbol.to_string(),
        })?;
        let content = fs::read_to_string(&path)?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| ArimaTraderError::Data {
            reason: format!("{}: {e}", path.display()),
        })?;
        let cols = Columns::from_headers(headers, &path)?;

        let mut bars = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| ArimaTraderError::Data {
                reason: format!("{}: CSV parse error: {e}", path.display()),
            })?;
            let field = |idx: usize, name: &str| {
                record.get(idx).ok_or_else(|| ArimaTraderError::Data {
                    reason: format!("{}: row {}: missing {name}", path.display(), line + 2),
                })
            };
            let number = |idx: usize, name: &str| -> Result<f64, ArimaTraderError> {
                let raw = field(idx, name)?;
                raw.parse::<f64>().map_err(|e| ArimaTraderError::Data {
                    reason: format!(
                        "{}: row {}: invalid {name} value {raw:?}: {e}",
                        path.display(),
                        line + 2
                    ),
                })
            };

            let raw_date = field(cols.date, "date")?;
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
                ArimaTraderError::Data {
                    reason: format!(
                        "{}: row {}: invalid date {raw_date:?}: {e}",
                        path.display(),
                        line + 2
                    ),
                }
            })?;

            bars.push(OhlcvBar {
                symbol: symbol.to_string(),
                date,
                open: number(cols.open, "open")?,
                high: number(cols.high, "high")?,
                low: number(cols.low, "low")?,
                close: number(cols.close, "close")?,
                volume: number(cols.volume, "volume")?.round() as i64,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ArimaTraderError> {
        let mut bars = self.read_bars(symbol)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ArimaTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ArimaTraderError::Data {
            reason: format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_price_file = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e));
            if !is_price_file {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }

        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ArimaTraderError> {
        if self.file_for(symbol).is_none() {
            return Ok(None);
        }
        let bars = self.read_bars(symbol)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

/// Write a feature frame as CSV: the bar columns followed by every feature
/// column. Undefined feature values are left empty.
pub fn write_feature_frame<W: Write>(frame: &FeatureFrame, out: W) -> Result<(), ArimaTraderError> {
    let to_data_err = |e: csv::Error| ArimaTraderError::Data {
        reason: format!("CSV write error: {e}"),
    };
    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec!["Date", "Open", "High", "Low", "Close", "Volume"];
    header.extend(frame.column_names());
    wtr.write_record(&header).map_err(to_data_err)?;

    for (i, bar) in frame.bars.iter().enumerate() {
        let mut row = vec![
            bar.date.format("%Y-%m-%d").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ];
        row.extend(
            frame
                .columns
                .iter()
                .map(|c| c.values[i].map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&row).map_err(to_data_err)?;
    }

    wtr.flush()?;
    Ok(())
}
