//! Broker port: the strategy's only view of cash, prices and order routing.

use chrono::NaiveDate;

use crate::domain::error::ArimaTraderError;
use crate::domain::order::{Fill, Order};

pub trait Broker {
    /// Date of the bar the broker is currently positioned on.
    fn current_date(&self) -> NaiveDate;

    fn get_cash(&self) -> f64;

    /// Latest known close for `symbol`, `None` before its first bar.
    fn get_last_price(&self, symbol: &str) -> Option<f64>;

    /// Observed opening prices for `symbol` up to and including the current bar.
    fn price_history(&self, symbol: &str) -> Option<&[f64]>;

    /// Submit a bracket order. Rejections are returned as errors and leave
    /// the account unchanged.
    fn submit_order(&mut self, order: Order) -> Result<Fill, ArimaTraderError>;

    /// Close every open position at the last price. Returns the number closed.
    fn sell_all(&mut self) -> usize;
}
