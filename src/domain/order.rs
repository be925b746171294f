//! Bracket orders and their fills.

use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

/// Market order with attached take-profit and stop-loss exits.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub quantity: u64,
    pub side: OrderSide,
    pub take_profit: f64,
    pub stop_loss: f64,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Closed by `sell_all` before switching symbol or direction.
    Liquidation,
    EndOfBacktest,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop loss",
            ExitReason::TakeProfit => "take profit",
            ExitReason::Liquidation => "liquidation",
            ExitReason::EndOfBacktest => "end of backtest",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillKind {
    Entry,
    Exit(ExitReason),
}

impl fmt::Display for FillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillKind::Entry => f.write_str("entry"),
            FillKind::Exit(reason) => fmt::Display::fmt(reason, f),
        }
    }
}

/// Executed trade, entry or exit.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
    pub commission: f64,
    pub kind: FillKind,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// Take-profit and stop-loss multipliers applied to the last price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketPolicy {
    pub long_take_profit: f64,
    pub long_stop_loss: f64,
    pub short_take_profit: f64,
    pub short_stop_loss: f64,
}

impl Default for BracketPolicy {
    fn default() -> Self {
        Self {
            long_take_profit: 1.20,
            long_stop_loss: 0.95,
            short_take_profit: 0.80,
            short_stop_loss: 1.05,
        }
    }
}

impl BracketPolicy {
    /// Buy on a predicted rise, sell otherwise, bracketed around `last_price`.
    pub fn order_for(
        &self,
        symbol: &str,
        quantity: u64,
        last_price: f64,
        pct_change: f64,
    ) -> Order {
        let (side, take_profit, stop_loss) = if pct_change > 0.0 {
            (
                OrderSide::Buy,
                last_price * self.long_take_profit,
                last_price * self.long_stop_loss,
            )
        } else {
            (
                OrderSide::Sell,
                last_price * self.short_take_profit,
                last_price * self.short_stop_loss,
            )
        };
        Order {
            symbol: symbol.to_string(),
            quantity,
            side,
            take_profit,
            stop_loss,
        }
    }
}
