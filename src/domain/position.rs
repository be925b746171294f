//! Open positions and closed round trips.

use chrono::NaiveDate;

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::order::{ExitReason, OrderSide};

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    /// Positive for long, negative for short.
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Zero disables the leg.
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_commission: f64,
}

impl Position {
    pub fn side(&self) -> OrderSide {
        if self.quantity > 0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    /// Contribution to account equity at `price`.
    ///
    /// Short entries escrow their notional, so a short is worth the escrow
    /// plus its unrealised gain.
    pub fn equity_value(&self, price: f64) -> f64 {
        let qty = self.quantity.unsigned_abs() as f64;
        match self.side() {
            OrderSide::Buy => qty * price,
            OrderSide::Sell => qty * (2.0 * self.entry_price - price),
        }
    }

    /// Whether `price` has reached `level` on the losing (`adverse`) or
    /// winning side of the position.
    fn reached(&self, level: f64, price: f64, adverse: bool) -> bool {
        if level == 0.0 {
            return false;
        }
        match (self.side(), adverse) {
            (OrderSide::Buy, true) | (OrderSide::Sell, false) => price <= level,
            (OrderSide::Buy, false) | (OrderSide::Sell, true) => price >= level,
        }
    }

    /// Bracket exit triggered within `bar`, with its fill price.
    ///
    /// The stop is checked against the bar's adverse extreme first, so it wins
    /// when both legs trigger. A bar that opens beyond a level fills at the open.
    pub fn bracket_exit(&self, bar: &OhlcvBar) -> Option<(ExitReason, f64)> {
        let (worst, best) = match self.side() {
            OrderSide::Buy => (bar.low, bar.high),
            OrderSide::Sell => (bar.high, bar.low),
        };

        let legs = [
            (ExitReason::StopLoss, self.stop_loss, worst, true),
            (ExitReason::TakeProfit, self.take_profit, best, false),
        ];
        legs.into_iter()
            .find(|&(_, level, extreme, adverse)| self.reached(level, extreme, adverse))
            .map(|(reason, level, _, adverse)| {
                let fill = if self.reached(level, bar.open, adverse) {
                    bar.open
                } else {
                    level
                };
                (reason, fill)
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    /// Net of entry and exit commissions.
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bracketed(quantity: i64, entry: f64, stop: f64, target: f64) -> Position {
        Position {
            symbol: "GOOG".into(),
            quantity,
            entry_price: entry,
            entry_date: NaiveDate::from_ymd_opt(2017, 3, 15).unwrap(),
            stop_loss: stop,
            take_profit: target,
            entry_commission: 0.0,
        }
    }

    fn long() -> Position {
        bracketed(100, 50.0, 45.0, 60.0)
    }

    fn short() -> Position {
        bracketed(-100, 100.0, 110.0, 80.0)
    }

    fn bar(open: f64, high: f64, low: f64) -> OhlcvBar {
        OhlcvBar {
            symbol: "GOOG".into(),
            date: NaiveDate::from_ymd_opt(2017, 3, 16).unwrap(),
            open,
            high,
            low,
            close: open,
            volume: 0,
        }
    }

    #[test]
    fn side_follows_quantity_sign() {
        assert_eq!(long().side(), OrderSide::Buy);
        assert_eq!(short().side(), OrderSide::Sell);
    }

    #[test]
    fn long_worth_market_value() {
        assert_eq!(long().equity_value(55.0), 5_500.0);
    }

    #[test]
    fn short_worth_escrow_plus_gain() {
        let pos = short();
        assert_eq!(pos.equity_value(100.0), 10_000.0);
        assert_eq!(pos.equity_value(90.0), 11_000.0);
        assert_eq!(pos.equity_value(110.0), 9_000.0);
    }

    #[test]
    fn quiet_bar_keeps_position() {
        assert_eq!(long().bracket_exit(&bar(50.0, 52.0, 48.0)), None);
        assert_eq!(short().bracket_exit(&bar(100.0, 105.0, 90.0)), None);
    }

    #[test]
    fn levels_touched_exactly_trigger() {
        assert_eq!(
            long().bracket_exit(&bar(50.0, 51.0, 45.0)),
            Some((ExitReason::StopLoss, 45.0))
        );
        assert_eq!(
            short().bracket_exit(&bar(90.0, 95.0, 80.0)),
            Some((ExitReason::TakeProfit, 80.0))
        );
    }

    #[test]
    fn long_and_short_legs() {
        assert_eq!(
            long().bracket_exit(&bar(50.0, 52.0, 44.0)),
            Some((ExitReason::StopLoss, 45.0))
        );
        assert_eq!(
            long().bracket_exit(&bar(55.0, 61.0, 54.0)),
            Some((ExitReason::TakeProfit, 60.0))
        );
        assert_eq!(
            short().bracket_exit(&bar(100.0, 111.0, 99.0)),
            Some((ExitReason::StopLoss, 110.0))
        );
        assert_eq!(
            short().bracket_exit(&bar(85.0, 86.0, 79.0)),
            Some((ExitReason::TakeProfit, 80.0))
        );
    }

    #[test]
    fn stop_wins_when_both_trigger() {
        assert_eq!(
            long().bracket_exit(&bar(50.0, 65.0, 40.0)),
            Some((ExitReason::StopLoss, 45.0))
        );
    }

    #[test]
    fn gap_through_fills_at_open() {
        assert_eq!(
            long().bracket_exit(&bar(42.0, 43.0, 41.0)),
            Some((ExitReason::StopLoss, 42.0))
        );
        assert_eq!(
            long().bracket_exit(&bar(63.0, 64.0, 62.0)),
            Some((ExitReason::TakeProfit, 63.0))
        );
        assert_eq!(
            short().bracket_exit(&bar(115.0, 116.0, 112.0)),
            Some((ExitReason::StopLoss, 115.0))
        );
    }

    #[test]
    fn zero_level_disables_leg() {
        let pos = bracketed(100, 50.0, 0.0, 0.0);
        assert_eq!(pos.bracket_exit(&bar(50.0, 1_000.0, 0.01)), None);
    }
}
