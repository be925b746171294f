//! Fill simulation: slippage, commissions, entries, exits and bracket triggers.
//!
//! Both directions escrow the entry notional plus commission from cash. A
//! long exit returns the sale proceeds; a short exit returns the escrow plus
//! the price gain (or minus the loss).

use chrono::NaiveDate;

use super::ohlcv::OhlcvBar;
use super::order::{ExitReason, Fill, FillKind, Order, OrderSide};
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    /// Percent of traded notional.
    pub commission_pct: f64,
    /// Percent of price, always against the trader.
    pub slippage_pct: f64,
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Execution price for a trade on `side`: buys pay up, sells receive less.
pub fn apply_slippage(market_price: f64, side: OrderSide, slippage_pct: f64) -> f64 {
    match side {
        OrderSide::Buy => market_price * (1.0 + slippage_pct / 100.0),
        OrderSide::Sell => market_price * (1.0 - slippage_pct / 100.0),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered(Fill),
    InsufficientCapital { required: f64, available: f64 },
}

/// Open (or add to) the position described by `order` at `market_price`.
///
/// An order on the side already held for the symbol extends the position at
/// a quantity-weighted entry price and replaces its bracket. An opposite
/// position on the same symbol is closed first.
pub fn enter_position(
    portfolio: &mut Portfolio,
    order: &Order,
    market_price: f64,
    date: NaiveDate,
    config: &ExecutionConfig,
) -> (EntryResult, Option<Fill>) {
    let execution_price = apply_slippage(market_price, order.side, config.slippage_pct);
    let cost = order.quantity as f64 * execution_price;
    let commission = calculate_commission(cost, config);
    let total_cost = cost + commission;

    let opposite_held = portfolio
        .position(&order.symbol)
        .is_some_and(|p| p.side() != order.side);
    let freed = if opposite_held {
        portfolio
            .position(&order.symbol)
            .map(|p| {
                let exit_side = p.side().opposite();
                let exit_price = apply_slippage(market_price, exit_side, config.slippage_pct);
                let value = p.equity_value(exit_price);
                value - calculate_commission(p.quantity.unsigned_abs() as f64 * exit_price, config)
            })
            .unwrap_or(0.0)
    } else {
        0.0
    };

    if order.quantity == 0 || total_cost > portfolio.cash + freed {
        return (
            EntryResult::InsufficientCapital {
                required: total_cost,
                available: portfolio.cash + freed,
            },
            None,
        );
    }

    let closed = if opposite_held {
        exit_position(
            portfolio,
            &order.symbol,
            market_price,
            date,
            ExitReason::Liquidation,
            config,
        )
    } else {
        None
    };

    portfolio.cash -= total_cost;

    let signed = order.side.sign() * order.quantity as i64;
    let position = match portfolio.take_position(&order.symbol) {
        Some(existing) => {
            let old_qty = existing.quantity.unsigned_abs() as f64;
            let add_qty = order.quantity as f64;
            Position {
                quantity: existing.quantity + signed,
                entry_price: (existing.entry_price * old_qty + execution_price * add_qty)
                    / (old_qty + add_qty),
                stop_loss: order.stop_loss,
                take_profit: order.take_profit,
                entry_commission: existing.entry_commission + commission,
                ..existing
            }
        }
        None => Position {
            symbol: order.symbol.clone(),
            quantity: signed,
            entry_price: execution_price,
            entry_date: date,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            entry_commission: commission,
        },
    };
    portfolio.open_position(position);

    let fill = Fill {
        date,
        symbol: order.symbol.clone(),
        side: order.side,
        quantity: order.quantity,
        price: execution_price,
        commission,
        kind: FillKind::Entry,
    };
    (EntryResult::Entered(fill), closed)
}

/// Close the position in `symbol` at `market_price`, recording the trade.
///
/// PnL is net of the position's entry commission and the exit commission.
pub fn exit_position(
    portfolio: &mut Portfolio,
    symbol: &str,
    market_price: f64,
    exit_date: NaiveDate,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<Fill> {
    let position = portfolio.take_position(symbol)?;
    let exit_side = position.side().opposite();
    let exit_price = apply_slippage(market_price, exit_side, config.slippage_pct);

    let qty_abs = position.quantity.unsigned_abs();
    let exit_value = qty_abs as f64 * exit_price;
    let exit_commission = calculate_commission(exit_value, config);

    let price_pnl = position.quantity as f64 * (exit_price - position.entry_price);
    let pnl = price_pnl - position.entry_commission - exit_commission;

    portfolio.cash += position.equity_value(exit_price) - exit_commission;

    portfolio.record_trade(ClosedTrade {
        symbol: position.symbol.clone(),
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price,
        entry_date: position.entry_date,
        exit_date,
        pnl,
        exit_reason: reason,
    });

    Some(Fill {
        date: exit_date,
        symbol: position.symbol,
        side: exit_side,
        quantity: qty_abs,
        price: exit_price,
        commission: exit_commission,
        kind: FillKind::Exit(reason),
    })
}

/// Check bracket levels of every position against the bar for its symbol.
///
/// Two passes: triggered symbols are collected first, then exited in sorted
/// order. Symbols without a bar are left alone.
pub fn check_triggers<'a, F>(
    portfolio: &mut Portfolio,
    bar_for: F,
    date: NaiveDate,
    config: &ExecutionConfig,
) -> Vec<Fill>
where
    F: Fn(&str) -> Option<&'a OhlcvBar>,
{
    let triggered: Vec<(String, ExitReason, f64)> = portfolio
        .held_symbols()
        .into_iter()
        .filter_map(|symbol| {
            let bar = bar_for(&symbol)?;
            let (reason, price) = portfolio.position(&symbol)?.bracket_exit(bar)?;
            Some((symbol, reason, price))
        })
        .collect();

    triggered
        .into_iter()
        .filter_map(|(symbol, reason, price)| {
            exit_position(portfolio, &symbol, price, date, reason, config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_config() -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: 10.0,
            commission_pct: 0.1,
            slippage_pct: 0.05,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 1, 16).unwrap()
    }

    fn later() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 1, 20).unwrap()
    }

    fn order(symbol: &str, side: OrderSide, quantity: u64, tp: f64, sl: f64) -> Order {
        Order {
            symbol: symbol.into(),
            quantity,
            side,
            take_profit: tp,
            stop_loss: sl,
        }
    }

    fn bar(symbol: &str, open: f64, high: f64, low: f64) -> OhlcvBar {
        OhlcvBar {
            symbol: symbol.into(),
            date: later(),
            open,
            high,
            low,
            close: open,
            volume: 1,
        }
    }

    fn entered(result: (EntryResult, Option<Fill>)) -> Fill {
        match result.0 {
            EntryResult::Entered(fill) => fill,
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn calculate_commission_basic() {
        let commission = calculate_commission(10000.0, &make_config());
        assert!((commission - 20.0).abs() < 1e-9);
    }

    #[test]
    fn slippage_is_adverse() {
        assert!((apply_slippage(100.0, OrderSide::Buy, 0.05) - 100.05).abs() < 1e-9);
        assert!((apply_slippage(100.0, OrderSide::Sell, 0.05) - 99.95).abs() < 1e-9);
        assert_eq!(apply_slippage(100.0, OrderSide::Buy, 0.0), 100.0);
    }

    #[test]
    fn enter_long_deducts_cost_and_commission() {
        let mut portfolio = Portfolio::new(100000.0);
        let config = make_config();
        let fill = entered(enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 100, 120.0, 95.0),
            100.0,
            date(),
            &config,
        ));
        let cost = 100.0 * 100.05;
        let commission = 10.0 + cost * 0.001;
        assert!((fill.price - 100.05).abs() < 1e-9);
        assert!((fill.commission - commission).abs() < 1e-9);
        assert!((portfolio.cash - (100000.0 - cost - commission)).abs() < 1e-9);
        let pos = portfolio.position("GOOG").unwrap();
        assert_eq!(pos.quantity, 100);
        assert_eq!(pos.take_profit, 120.0);
        assert_eq!(pos.stop_loss, 95.0);
    }

    #[test]
    fn enter_short_escrows_notional() {
        let mut portfolio = Portfolio::new(10000.0);
        let fill = entered(enter_position(
            &mut portfolio,
            &order("TSLA", OrderSide::Sell, 10, 80.0, 105.0),
            100.0,
            date(),
            &ExecutionConfig::default(),
        ));
        assert_eq!(fill.side, OrderSide::Sell);
        assert!((portfolio.cash - 9000.0).abs() < 1e-9);
        assert_eq!(portfolio.position("TSLA").unwrap().quantity, -10);
    }

    #[test]
    fn insufficient_capital_leaves_portfolio_untouched() {
        let mut portfolio = Portfolio::new(50.0);
        let (result, _) = enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 1, 120.0, 95.0),
            100.0,
            date(),
            &make_config(),
        );
        assert!(matches!(result, EntryResult::InsufficientCapital { .. }));
        assert!(!portfolio.holds("GOOG"));
        assert_eq!(portfolio.cash, 50.0);
    }

    #[test]
    fn cost_plus_commission_exceeding_cash_is_rejected() {
        let mut portfolio = Portfolio::new(1000.0);
        let config = ExecutionConfig {
            commission_per_trade: 5.0,
            ..Default::default()
        };
        let (result, _) = enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 10, 0.0, 0.0),
            100.0,
            date(),
            &config,
        );
        assert!(matches!(
            result,
            EntryResult::InsufficientCapital { required, .. } if (required - 1005.0).abs() < 1e-9
        ));
    }

    #[test]
    fn same_side_order_extends_position() {
        let mut portfolio = Portfolio::new(100000.0);
        let config = ExecutionConfig::default();
        enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 100, 120.0, 95.0),
            100.0,
            date(),
            &config,
        );
        enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 100, 132.0, 104.5),
            110.0,
            later(),
            &config,
        );
        let pos = portfolio.position("GOOG").unwrap();
        assert_eq!(pos.quantity, 200);
        assert!((pos.entry_price - 105.0).abs() < 1e-9);
        assert_eq!(pos.take_profit, 132.0);
        assert_eq!(pos.entry_date, date());
        assert!((portfolio.cash - (100000.0 - 10000.0 - 11000.0)).abs() < 1e-9);
    }

    #[test]
    fn opposite_order_on_same_symbol_flips() {
        let mut portfolio = Portfolio::new(10000.0);
        let config = ExecutionConfig::default();
        enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 50, 0.0, 0.0),
            100.0,
            date(),
            &config,
        );
        let (result, closed) = enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Sell, 50, 0.0, 0.0),
            110.0,
            later(),
            &config,
        );
        assert!(matches!(result, EntryResult::Entered(_)));
        let closed = closed.unwrap();
        assert_eq!(closed.kind, FillKind::Exit(ExitReason::Liquidation));
        assert_eq!(portfolio.position("GOOG").unwrap().quantity, -50);
        assert_eq!(portfolio.closed_trades.len(), 1);
        assert!((portfolio.closed_trades[0].pnl - 500.0).abs() < 1e-9);
    }

    #[test]
    fn exit_long_profit() {
        let mut portfolio = Portfolio::new(100000.0);
        let config = make_config();
        let entry = entered(enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 100, 0.0, 0.0),
            100.0,
            date(),
            &config,
        ));
        let fill = exit_position(
            &mut portfolio,
            "GOOG",
            110.0,
            later(),
            ExitReason::Liquidation,
            &config,
        )
        .unwrap();

        let exit_price = 110.0 * 0.9995;
        let exit_value = 100.0 * exit_price;
        let exit_commission = 10.0 + exit_value * 0.001;
        let expected_pnl = 100.0 * (exit_price - entry.price) - entry.commission - exit_commission;

        assert_eq!(fill.side, OrderSide::Sell);
        let trade = &portfolio.closed_trades[0];
        assert!((trade.pnl - expected_pnl).abs() < 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::Liquidation);
        assert!(!portfolio.holds("GOOG"));
    }

    #[test]
    fn exit_nonexistent_position() {
        let mut portfolio = Portfolio::new(100000.0);
        let fill = exit_position(
            &mut portfolio,
            "XYZ",
            1.0,
            date(),
            ExitReason::Liquidation,
            &make_config(),
        );
        assert!(fill.is_none());
    }

    #[test]
    fn short_round_trip_cash_conservation() {
        let mut portfolio = Portfolio::new(10000.0);
        let config = ExecutionConfig::default();
        enter_position(
            &mut portfolio,
            &order("TSLA", OrderSide::Sell, 10, 0.0, 0.0),
            100.0,
            date(),
            &config,
        );
        exit_position(&mut portfolio, "TSLA", 90.0, later(), ExitReason::TakeProfit, &config);
        assert!((portfolio.cash - 10100.0).abs() < 1e-9);
        assert!((portfolio.closed_trades[0].pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn check_triggers_exits_at_bracket_levels() {
        let mut portfolio = Portfolio::new(100000.0);
        let config = ExecutionConfig::default();
        enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 10, 120.0, 95.0),
            100.0,
            date(),
            &config,
        );
        enter_position(
            &mut portfolio,
            &order("TSLA", OrderSide::Sell, 10, 80.0, 105.0),
            100.0,
            date(),
            &config,
        );
        enter_position(
            &mut portfolio,
            &order("NVDA", OrderSide::Buy, 10, 120.0, 95.0),
            100.0,
            date(),
            &config,
        );

        let bars: HashMap<String, OhlcvBar> = [
            ("GOOG".to_string(), bar("GOOG", 99.0, 100.0, 94.0)),
            ("TSLA".to_string(), bar("TSLA", 90.0, 91.0, 79.0)),
            ("NVDA".to_string(), bar("NVDA", 101.0, 102.0, 99.0)),
        ]
        .into_iter()
        .collect();

        let fills = check_triggers(&mut portfolio, |s| bars.get(s), later(), &config);
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].symbol, "GOOG");
        assert_eq!(fills[0].kind, FillKind::Exit(ExitReason::StopLoss));
        assert!((fills[0].price - 95.0).abs() < 1e-9);
        assert_eq!(fills[1].symbol, "TSLA");
        assert_eq!(fills[1].kind, FillKind::Exit(ExitReason::TakeProfit));
        assert!(portfolio.holds("NVDA"));
        assert_eq!(portfolio.positions.len(), 1);
    }

    #[test]
    fn check_triggers_skips_symbols_without_bar() {
        let mut portfolio = Portfolio::new(100000.0);
        let config = ExecutionConfig::default();
        enter_position(
            &mut portfolio,
            &order("GOOG", OrderSide::Buy, 10, 120.0, 95.0),
            100.0,
            date(),
            &config,
        );
        let fills = check_triggers(&mut portfolio, |_| None, later(), &config);
        assert!(fills.is_empty());
        assert!(portfolio.holds("GOOG"));
    }
}
