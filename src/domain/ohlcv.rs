//! Daily price bar.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// True when low <= open, close <= high and every price is positive.
    pub fn is_consistent(&self) -> bool {
        self.low > 0.0
            && self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }
}

/// Extract the opening prices of a bar slice, in order.
pub fn opens(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.open).collect()
}
