//! HTML report adapter implementing ReportPort.
//!
//! Renders the `report.html` Askama template with inline SVG charts. Every
//! number is formatted here so the template stays logic-free.

use askama::Template;

use crate::adapters::chart_svg::{generate_drawdown_svg, generate_equity_svg};
use crate::domain::error::ArimaTraderError;
use crate::domain::metrics::{Metrics, monthly_returns};
use crate::domain::report::ReportContext;
use crate::ports::report_port::ReportPort;

struct Row {
    label: &'static str,
    value: String,
}

fn row(label: &'static str, value: String) -> Row {
    Row { label, value }
}

struct HeatCell {
    text: String,
    class: &'static str,
}

struct MonthlyRow {
    year: i32,
    cells: Vec<HeatCell>,
}

struct ModelRow {
    symbol: String,
    name: String,
    order: String,
    intercept: String,
    period: String,
    aic: String,
    rmse: String,
}

struct SymbolRow {
    symbol: String,
    trades: usize,
    win_rate: String,
    pnl: String,
    pnl_class: &'static str,
}

struct OrderRow {
    date: String,
    symbol: String,
    side: String,
    kind: String,
    quantity: u64,
    price: String,
    commission: String,
}

struct TradeRow {
    symbol: String,
    direction: &'static str,
    quantity: u64,
    entry_date: String,
    entry_price: String,
    exit_date: String,
    exit_price: String,
    pnl: String,
    pnl_class: &'static str,
    reason: String,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    strategy_name: String,
    period: String,
    params: Vec<Row>,
    metrics: Vec<Row>,
    equity_svg: String,
    drawdown_svg: String,
    monthly: Vec<MonthlyRow>,
    models: Vec<ModelRow>,
    symbols: Vec<SymbolRow>,
    orders: Vec<OrderRow>,
    trades: Vec<TradeRow>,
}

fn pnl_class(value: f64) -> &'static str {
    if value > 0.0 {
        "pos"
    } else if value < 0.0 {
        "neg"
    } else {
        ""
    }
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn metric_rows(m: &Metrics) -> Vec<Row> {
    let profit_factor = if m.profit_factor.is_finite() {
        format!("{:.2}", m.profit_factor)
    } else {
        "inf".to_string()
    };
    vec![
        row("Final Equity", money(m.final_equity)),
        row("Total Return", pct(m.total_return)),
        row("Annualized Return", pct(m.annualized_return)),
        row("Sharpe Ratio", format!("{:.2}", m.sharpe_ratio)),
        row("Sortino Ratio", format!("{:.2}", m.sortino_ratio)),
        row("Max Drawdown", pct(m.max_drawdown)),
        row(
            "Max Drawdown Duration",
            format!("{} days", m.max_drawdown_duration),
        ),
        row("Total Trades", m.total_trades.to_string()),
        row("Trades Won", m.trades_won.to_string()),
        row("Trades Lost", m.trades_lost.to_string()),
        row("Trades Breakeven", m.trades_breakeven.to_string()),
        row("Win Rate", pct(m.win_rate)),
        row("Profit Factor", profit_factor),
        row("Average Win", money(m.avg_win)),
        row("Average Loss", money(m.avg_loss)),
        row("Largest Win", money(m.largest_win)),
        row("Largest Loss", money(m.largest_loss)),
        row(
            "Average Trade Duration",
            format!("{:.1} days", m.avg_trade_duration),
        ),
    ]
}

fn heat_class(ret: f64) -> &'static str {
    if ret >= 0.05 {
        "heat-up-strong"
    } else if ret > 0.0 {
        "heat-up"
    } else if ret <= -0.05 {
        "heat-down-strong"
    } else if ret < 0.0 {
        "heat-down"
    } else {
        ""
    }
}

fn monthly_rows(ctx: &ReportContext<'_>) -> Vec<MonthlyRow> {
    let months = monthly_returns(&ctx.result.portfolio.equity_curve);
    let (Some(first), Some(last)) = (months.first(), months.last()) else {
        return Vec::new();
    };
    (first.year..=last.year)
        .map(|year| {
            let mut ytd = 1.0;
            let mut cells: Vec<HeatCell> = (1..=12)
                .map(|month| {
                    match months.iter().find(|m| m.year == year && m.month == month) {
                        Some(m) => {
                            ytd *= 1.0 + m.return_pct;
                            HeatCell {
                                text: format!("{:+.1}%", m.return_pct * 100.0),
                                class: heat_class(m.return_pct),
                            }
                        }
                        None => HeatCell {
                            text: "-".into(),
                            class: "",
                        },
                    }
                })
                .collect();
            let ytd = ytd - 1.0;
            cells.push(HeatCell {
                text: format!("{:+.1}%", ytd * 100.0),
                class: heat_class(ytd),
            });
            MonthlyRow { year, cells }
        })
        .collect()
}

impl ReportTemplate {
    fn from_context(ctx: &ReportContext<'_>) -> Self {
        let p = ctx.params;
        let params = vec![
            row("Initial Capital", money(ctx.initial_capital)),
            row("Cash at Risk", pct(p.cash_at_risk)),
            row("Forecast Horizon", format!("{} days", p.forecast_horizon)),
            row("Forecast Anchor", p.forecast_from.to_string()),
            row(
                "Long Bracket",
                format!(
                    "TP x{:.2}, SL x{:.2}",
                    p.bracket.long_take_profit, p.bracket.long_stop_loss
                ),
            ),
            row(
                "Short Bracket",
                format!(
                    "TP x{:.2}, SL x{:.2}",
                    p.bracket.short_take_profit, p.bracket.short_stop_loss
                ),
            ),
            row("Iterations", ctx.result.counts.iterations.to_string()),
            row("Orders Submitted", ctx.result.counts.orders.to_string()),
            row("Bracket Exits", ctx.result.counts.bracket_exits.to_string()),
        ];

        let models = ctx
            .models
            .iter()
            .map(|m| ModelRow {
                symbol: m.symbol.clone(),
                name: m.name.clone(),
                order: m.model.order.to_string(),
                intercept: if m.model.with_intercept {
                    format!("{:.4}", m.model.intercept)
                } else {
                    "-".into()
                },
                period: format!("{} to {}", m.train_start, m.train_end),
                aic: format!("{:.1}", m.model.aic),
                rmse: m
                    .evaluation
                    .as_ref()
                    .map(|e| format!("{:.3}", e.rmse))
                    .unwrap_or_else(|| "-".into()),
            })
            .collect();

        let symbols = ctx
            .symbol_results
            .iter()
            .map(|s| SymbolRow {
                symbol: s.symbol.clone(),
                trades: s.total_trades,
                win_rate: pct(s.win_rate),
                pnl: money(s.total_pnl),
                pnl_class: pnl_class(s.total_pnl),
            })
            .collect();

        let orders = ctx
            .result
            .fills
            .iter()
            .map(|f| OrderRow {
                date: f.date.to_string(),
                symbol: f.symbol.clone(),
                side: f.side.to_string(),
                kind: f.kind.to_string(),
                quantity: f.quantity,
                price: money(f.price),
                commission: money(f.commission),
            })
            .collect();

        let trades = ctx
            .result
            .portfolio
            .closed_trades
            .iter()
            .map(|t| TradeRow {
                symbol: t.symbol.clone(),
                direction: if t.quantity > 0 { "long" } else { "short" },
                quantity: t.quantity.unsigned_abs(),
                entry_date: t.entry_date.to_string(),
                entry_price: money(t.entry_price),
                exit_date: t.exit_date.to_string(),
                exit_price: money(t.exit_price),
                pnl: money(t.pnl),
                pnl_class: pnl_class(t.pnl),
                reason: t.exit_reason.to_string(),
            })
            .collect();

        ReportTemplate {
            strategy_name: p.name.clone(),
            period: format!("{} to {}", ctx.start_date, ctx.end_date),
            params,
            metrics: metric_rows(ctx.metrics),
            equity_svg: generate_equity_svg(&ctx.result.portfolio.equity_curve),
            drawdown_svg: generate_drawdown_svg(&ctx.result.portfolio.equity_curve),
            monthly: monthly_rows(ctx),
            models,
            symbols,
            orders,
            trades,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReportAdapter;

impl HtmlReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for HtmlReportAdapter {
    fn render(&self, ctx: &ReportContext<'_>) -> Result<String, ArimaTraderError> {
        ReportTemplate::from_context(ctx)
            .render()
            .map_err(|e| ArimaTraderError::Report {
                reason: e.to_string(),
            })
    }
}
