//! Price data access port.

use crate::domain::error::ArimaTraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` with `start_date <= date <= end_date`, sorted by date.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ArimaTraderError>;

    /// Every bar available for `symbol`.
    fn fetch_all(&self, symbol: &str) -> Result<Vec<OhlcvBar>, ArimaTraderError> {
        self.fetch_ohlcv(symbol, NaiveDate::MIN, NaiveDate::MAX)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ArimaTraderError>;

    /// First date, last date and bar count, or `None` when the symbol has no data.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ArimaTraderError>;
}
