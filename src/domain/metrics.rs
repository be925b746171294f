//! Performance statistics of a finished backtest.
//!
//! Returns are daily (one equity point per trading iteration) and annualised
//! over 252 trading days. Volatility uses the population standard deviation.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::portfolio::{EquityPoint, Portfolio};
use super::position::ClosedTrade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of consecutive points below the running peak.
    pub max_drawdown_duration: i64,
    pub final_equity: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    /// Magnitude of the worst trade, non-negative.
    pub largest_loss: f64,
    /// Mean calendar days from entry to exit.
    pub avg_trade_duration: f64,
}

/// Sums over closed trades, split by outcome.
#[derive(Default)]
struct TradeStats {
    won: usize,
    lost: usize,
    breakeven: usize,
    gross_profit: f64,
    gross_loss: f64,
    largest_win: f64,
    largest_loss: f64,
    held_days: i64,
}

impl TradeStats {
    fn from_trades(trades: &[ClosedTrade]) -> Self {
        trades.iter().fold(Self::default(), |mut s, t| {
            if t.pnl > 0.0 {
                s.won += 1;
                s.gross_profit += t.pnl;
                s.largest_win = s.largest_win.max(t.pnl);
            } else if t.pnl < 0.0 {
                s.lost += 1;
                s.gross_loss -= t.pnl;
                s.largest_loss = s.largest_loss.max(-t.pnl);
            } else {
                s.breakeven += 1;
            }
            s.held_days += (t.exit_date - t.entry_date).num_days();
            s
        })
    }

    fn count(&self) -> usize {
        self.won + self.lost + self.breakeven
    }

    fn profit_factor(&self) -> f64 {
        match (self.gross_profit > 0.0, self.gross_loss > 0.0) {
            (_, true) => self.gross_profit / self.gross_loss,
            (true, false) => f64::INFINITY,
            (false, false) => 0.0,
        }
    }
}

fn ratio(num: f64, den: usize) -> f64 {
    if den > 0 { num / den as f64 } else { 0.0 }
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let curve = &portfolio.equity_curve;
        let initial = portfolio.initial_capital;
        let final_equity = curve.last().map_or(initial, |p| p.equity);

        let total_return = if initial > 0.0 {
            (final_equity - initial) / initial
        } else {
            0.0
        };
        let years = curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        // a short can lose more than its escrow; past -100% there is no real root
        let annualized_return = if years <= 0.0 || !total_return.is_finite() {
            0.0
        } else if total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            -1.0
        };

        let (max_drawdown, max_drawdown_duration) = max_drawdown(curve);
        let (sharpe_ratio, sortino_ratio) =
            risk_adjusted(&daily_returns(curve), risk_free_rate / TRADING_DAYS_PER_YEAR);

        let stats = TradeStats::from_trades(&portfolio.closed_trades);
        let total_trades = stats.count();

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            final_equity,
            total_trades,
            trades_won: stats.won,
            trades_lost: stats.lost,
            trades_breakeven: stats.breakeven,
            win_rate: ratio(stats.won as f64, total_trades),
            profit_factor: stats.profit_factor(),
            avg_win: ratio(stats.gross_profit, stats.won),
            avg_loss: ratio(stats.gross_loss, stats.lost),
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
            avg_trade_duration: ratio(stats.held_days as f64, total_trades),
        }
    }
}

/// Closed-trade statistics for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub symbol: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl SymbolResult {
    /// One entry per traded symbol, sorted by symbol.
    pub fn compute_per_symbol(trades: &[ClosedTrade]) -> Vec<SymbolResult> {
        let mut grouped: BTreeMap<&str, Vec<ClosedTrade>> = BTreeMap::new();
        for trade in trades {
            grouped.entry(trade.symbol.as_str()).or_default().push(trade.clone());
        }

        grouped
            .into_iter()
            .map(|(symbol, trades)| {
                let stats = TradeStats::from_trades(&trades);
                SymbolResult {
                    symbol: symbol.to_string(),
                    total_trades: trades.len(),
                    winning_trades: stats.won,
                    losing_trades: stats.lost,
                    win_rate: ratio(stats.won as f64, trades.len()),
                    total_pnl: trades.iter().map(|t| t.pnl).sum(),
                    largest_win: stats.largest_win,
                    largest_loss: stats.largest_loss,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
}

/// Month-end to month-end returns. The first month is measured from the
/// first equity point.
pub fn monthly_returns(equity_curve: &[EquityPoint]) -> Vec<MonthlyReturn> {
    let Some(first) = equity_curve.first() else {
        return Vec::new();
    };

    let mut month_end: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for point in equity_curve {
        month_end.insert((point.date.year(), point.date.month()), point.equity);
    }

    let mut previous = first.equity;
    month_end
        .into_iter()
        .map(|((year, month), equity)| {
            let return_pct = if previous > 0.0 {
                (equity - previous) / previous
            } else {
                0.0
            };
            previous = equity;
            MonthlyReturn {
                year,
                month,
                return_pct,
            }
        })
        .collect()
}

/// Running drawdown from the peak, as a non-negative fraction per point.
pub fn drawdown_series(equity_curve: &[EquityPoint]) -> Vec<(NaiveDate, f64)> {
    let mut peak = f64::MIN;
    equity_curve
        .iter()
        .map(|point| {
            peak = peak.max(point.equity);
            let dd = if peak > 0.0 {
                (peak - point.equity) / peak
            } else {
                0.0
            };
            (point.date, dd)
        })
        .collect()
}

/// Deepest drawdown and the longest underwater stretch in points.
fn max_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let mut deepest = 0.0_f64;
    let mut run = 0i64;
    let mut longest = 0i64;
    for (_, dd) in drawdown_series(equity_curve) {
        deepest = deepest.max(dd);
        run = if dd > 0.0 { run + 1 } else { 0 };
        longest = longest.max(run);
    }
    (deepest, longest)
}

fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                w[1].equity / w[0].equity - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Annualised Sharpe and Sortino ratios. Downside deviation divides by the
/// number of all returns, not only the losing ones.
fn risk_adjusted(returns: &[f64], daily_rf: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let excess = mean - daily_rf;

    let stddev = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let downside = (returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|r| (r - daily_rf).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let annualise = |dev: f64| {
        if dev > 0.0 {
            excess / dev * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        }
    };
    (annualise(stddev), annualise(downside))
}
