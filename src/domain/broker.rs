//! In-process broker used by the backtest.
//!
//! The broker is positioned on one date at a time. Prices seen by the
//! strategy are the latest close at or before that date; a symbol with no bar
//! on the date keeps its previous close.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::error::ArimaTraderError;
use crate::domain::execution::{self, EntryResult, ExecutionConfig};
use crate::domain::market_data::SymbolData;
use crate::domain::order::{ExitReason, Fill, Order};
use crate::domain::portfolio::Portfolio;
use crate::ports::broker_port::Broker;

pub struct SimulatedBroker {
    data: Vec<SymbolData>,
    lookup: HashMap<String, usize>,
    cursor: Vec<Option<usize>>,
    current_date: NaiveDate,
    portfolio: Portfolio,
    config: ExecutionConfig,
    fills: Vec<Fill>,
}

impl SimulatedBroker {
    pub fn new(data: Vec<SymbolData>, initial_capital: f64, config: ExecutionConfig) -> Self {
        let lookup = data
            .iter()
            .enumerate()
            .map(|(i, sd)| (sd.symbol.clone(), i))
            .collect();
        let cursor = vec![None; data.len()];
        Self {
            data,
            lookup,
            cursor,
            current_date: NaiveDate::MIN,
            portfolio: Portfolio::new(initial_capital),
            config,
            fills: Vec::new(),
        }
    }

    /// Move to `date` and run bracket checks on bars dated exactly `date`.
    pub fn advance_to(&mut self, date: NaiveDate) -> Vec<Fill> {
        self.current_date = date;
        for (i, sd) in self.data.iter().enumerate() {
            self.cursor[i] = sd.index_at_or_before(date);
        }

        let data = &self.data;
        let lookup = &self.lookup;
        let triggered = execution::check_triggers(
            &mut self.portfolio,
            |symbol| lookup.get(symbol).and_then(|&i| data[i].get_bar(date)),
            date,
            &self.config,
        );
        for fill in &triggered {
            debug!(
                %date,
                symbol = %fill.symbol,
                kind = %fill.kind,
                price = fill.price,
                "bracket exit"
            );
        }
        self.fills.extend(triggered.iter().cloned());
        triggered
    }

    /// Latest close of every symbol that has traded by the current date.
    pub fn price_map(&self) -> HashMap<String, f64> {
        self.data
            .iter()
            .zip(&self.cursor)
            .filter_map(|(sd, idx)| idx.map(|i| (sd.symbol.clone(), sd.bars[i].close)))
            .collect()
    }

    pub fn equity(&self) -> f64 {
        self.portfolio.equity_at(&self.price_map())
    }

    pub fn record_equity(&mut self) {
        let equity = self.equity();
        self.portfolio.record_equity(self.current_date, equity);
    }

    /// Revalue the latest equity point, after exits that happen once the
    /// day's point was recorded.
    pub fn restate_equity(&mut self) {
        let equity = self.equity();
        if let Some(last) = self.portfolio.equity_curve.last_mut() {
            last.equity = equity;
        }
    }

    /// Close every open position at its last close.
    pub fn close_all(&mut self, reason: ExitReason) -> Vec<Fill> {
        let prices = self.price_map();
        let mut closed = Vec::new();
        for symbol in self.portfolio.held_symbols() {
            let Some(&price) = prices.get(&symbol) else {
                continue;
            };
            if let Some(fill) = execution::exit_position(
                &mut self.portfolio,
                &symbol,
                price,
                self.current_date,
                reason,
                &self.config,
            ) {
                closed.push(fill);
            }
        }
        self.fills.extend(closed.iter().cloned());
        closed
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn into_parts(self) -> (Portfolio, Vec<Fill>) {
        (self.portfolio, self.fills)
    }

    fn index_of(&self, symbol: &str) -> Option<(usize, usize)> {
        let i = *self.lookup.get(symbol)?;
        self.cursor[i].map(|bar| (i, bar))
    }
}

impl Broker for SimulatedBroker {
    fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    fn get_cash(&self) -> f64 {
        self.portfolio.cash
    }

    fn get_last_price(&self, symbol: &str) -> Option<f64> {
        self.index_of(symbol).map(|(i, bar)| self.data[i].bars[bar].close)
    }

    fn price_history(&self, symbol: &str) -> Option<&[f64]> {
        self.index_of(symbol).map(|(i, bar)| &self.data[i].opens[..=bar])
    }

    fn submit_order(&mut self, order: Order) -> Result<Fill, ArimaTraderError> {
        let price = self
            .get_last_price(&order.symbol)
            .ok_or_else(|| ArimaTraderError::OrderRejected {
                symbol: order.symbol.clone(),
                reason: format!("no price on or before {}", self.current_date),
            })?;

        let (result, closed) = execution::enter_position(
            &mut self.portfolio,
            &order,
            price,
            self.current_date,
            &self.config,
        );
        self.fills.extend(closed);
        match result {
            EntryResult::Entered(fill) => {
                self.fills.push(fill.clone());
                Ok(fill)
            }
            EntryResult::InsufficientCapital {
                required,
                available,
            } => Err(ArimaTraderError::OrderRejected {
                symbol: order.symbol,
                reason: format!("needs {required:.2}, {available:.2} available"),
            }),
        }
    }

    fn sell_all(&mut self) -> usize {
        self.close_all(ExitReason::Liquidation).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::order::{FillKind, OrderSide};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 3, day).unwrap()
    }

    fn bar(symbol: &str, day: u32, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            symbol: symbol.into(),
            date: d(day),
            open,
            high,
            low,
            close,
            volume: 100,
        }
    }

    fn broker() -> SimulatedBroker {
        let goog = SymbolData::new(
            "GOOG".into(),
            vec![
                bar("GOOG", 1, 100.0, 101.0, 99.0, 100.0),
                bar("GOOG", 2, 100.0, 103.0, 99.0, 102.0),
                bar("GOOG", 3, 102.0, 104.0, 90.0, 92.0),
            ],
        );
        let tsla = SymbolData::new(
            "TSLA".into(),
            vec![
                bar("TSLA", 2, 200.0, 201.0, 199.0, 200.0),
                bar("TSLA", 3, 200.0, 202.0, 198.0, 201.0),
            ],
        );
        SimulatedBroker::new(vec![goog, tsla], 10_000.0, ExecutionConfig::default())
    }

    fn buy(symbol: &str, quantity: u64, tp: f64, sl: f64) -> Order {
        Order {
            symbol: symbol.into(),
            quantity,
            side: OrderSide::Buy,
            take_profit: tp,
            stop_loss: sl,
        }
    }

    #[test]
    fn prices_follow_the_cursor() {
        let mut b = broker();
        b.advance_to(d(1));
        assert_eq!(b.get_last_price("GOOG"), Some(100.0));
        assert_eq!(b.get_last_price("TSLA"), None);
        assert_eq!(b.price_history("GOOG").unwrap(), &[100.0]);
        b.advance_to(d(2));
        assert_eq!(b.get_last_price("TSLA"), Some(200.0));
        assert_eq!(b.price_history("GOOG").unwrap(), &[100.0, 100.0]);
        assert_eq!(b.get_last_price("NVDA"), None);
    }

    #[test]
    fn stale_price_carries_forward() {
        let mut b = broker();
        b.advance_to(d(5));
        assert_eq!(b.get_last_price("GOOG"), Some(92.0));
        assert_eq!(b.current_date(), d(5));
    }

    #[test]
    fn submit_fills_at_last_close() {
        let mut b = broker();
        b.advance_to(d(2));
        let fill = b.submit_order(buy("GOOG", 10, 120.0, 95.0)).unwrap();
        assert_eq!(fill.price, 102.0);
        assert!((b.get_cash() - 8980.0).abs() < 1e-9);
        assert!((b.equity() - 10_000.0).abs() < 1e-9);
        assert_eq!(b.fills().len(), 1);
    }

    #[test]
    fn rejected_order_leaves_account_unchanged() {
        let mut b = broker();
        b.advance_to(d(2));
        let err = b.submit_order(buy("GOOG", 1000, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ArimaTraderError::OrderRejected { .. }));
        assert_eq!(b.get_cash(), 10_000.0);
        assert!(b.fills().is_empty());

        let err = b.submit_order(buy("NVDA", 1, 0.0, 0.0)).unwrap_err();
        assert!(err.to_string().contains("NVDA"));
    }

    #[test]
    fn stop_loss_triggers_on_next_bar() {
        let mut b = broker();
        b.advance_to(d(2));
        b.submit_order(buy("GOOG", 10, 120.0, 95.0)).unwrap();
        let exits = b.advance_to(d(3));
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].kind, FillKind::Exit(ExitReason::StopLoss));
        assert_eq!(exits[0].price, 95.0);
        assert!(b.portfolio().positions.is_empty());
        assert!((b.get_cash() - 9930.0).abs() < 1e-9);
    }

    #[test]
    fn sell_all_closes_everything() {
        let mut b = broker();
        b.advance_to(d(2));
        b.submit_order(buy("GOOG", 10, 0.0, 0.0)).unwrap();
        b.submit_order(Order {
            side: OrderSide::Sell,
            ..buy("TSLA", 5, 0.0, 0.0)
        })
        .unwrap();
        assert_eq!(b.sell_all(), 2);
        assert!(b.portfolio().positions.is_empty());
        assert_eq!(b.portfolio().closed_trades.len(), 2);
        assert!((b.get_cash() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn record_equity_uses_current_date() {
        let mut b = broker();
        b.advance_to(d(1));
        b.record_equity();
        let (portfolio, fills) = b.into_parts();
        assert_eq!(portfolio.equity_curve[0].date, d(1));
        assert!(fills.is_empty());
    }
}
