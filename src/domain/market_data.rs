//! Per-symbol bar series and the unified trading timeline.

use crate::domain::ohlcv::{OhlcvBar, opens};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
    pub opens: Vec<f64>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl SymbolData {
    /// Bars are sorted by date on construction.
    pub fn new(symbol: String, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        let opens = opens(&bars);
        Self {
            symbol,
            bars,
            opens,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Index of the last bar dated on or before `date`.
    pub fn index_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        self.bars.partition_point(|b| b.date <= date).checked_sub(1)
    }
}

pub fn build_unified_timeline(data: &[SymbolData]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = data
        .iter()
        .flat_map(|sd| sd.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
