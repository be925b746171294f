//! The ARIMA trading strategy, run once per trading day.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::domain::error::ArimaTraderError;
use crate::domain::order::{BracketPolicy, Fill, Order, OrderSide};
use crate::domain::selection::{Selection, forecast_pct_change, select_best};
use crate::domain::sizing::Sizing;
use crate::domain::training::TrainedModel;
use crate::ports::broker_port::Broker;
use crate::ports::config_port::ConfigPort;

/// Which series a forecast continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForecastAnchor {
    /// Observed opens up to the current bar.
    #[default]
    History,
    /// The end of the training sample; the forecast is the same every day.
    Training,
}

impl FromStr for ForecastAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "history" => Ok(ForecastAnchor::History),
            "training" => Ok(ForecastAnchor::Training),
            other => Err(format!("expected 'history' or 'training', got '{other}'")),
        }
    }
}

impl fmt::Display for ForecastAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastAnchor::History => f.write_str("history"),
            ForecastAnchor::Training => f.write_str("training"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub name: String,
    pub cash_at_risk: f64,
    pub forecast_horizon: usize,
    pub forecast_from: ForecastAnchor,
    pub bracket: BracketPolicy,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            name: "arima_backtest_multi_stock".into(),
            cash_at_risk: 0.5,
            forecast_horizon: 5,
            forecast_from: ForecastAnchor::History,
            bracket: BracketPolicy::default(),
        }
    }
}

impl StrategyParams {
    /// Read the `[strategy]` section. Range checks live in `config_validation`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ArimaTraderError> {
        let d = Self::default();
        let forecast_from = match config.get_string("strategy", "forecast_from") {
            Some(raw) => raw.parse().map_err(|reason| ArimaTraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "forecast_from".into(),
                reason,
            })?,
            None => d.forecast_from,
        };
        let horizon = config.get_int("strategy", "forecast_horizon", d.forecast_horizon as i64);
        let forecast_horizon = usize::try_from(horizon)
            .ok()
            .filter(|h| *h >= 1)
            .ok_or_else(|| ArimaTraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "forecast_horizon".into(),
                reason: "must be at least 1".into(),
            })?;
        Ok(Self {
            name: config.get_string("strategy", "name").unwrap_or(d.name),
            cash_at_risk: config.get_double("strategy", "cash_at_risk", d.cash_at_risk),
            forecast_horizon,
            forecast_from,
            bracket: BracketPolicy {
                long_take_profit: config.get_double(
                    "strategy",
                    "long_take_profit",
                    d.bracket.long_take_profit,
                ),
                long_stop_loss: config.get_double(
                    "strategy",
                    "long_stop_loss",
                    d.bracket.long_stop_loss,
                ),
                short_take_profit: config.get_double(
                    "strategy",
                    "short_take_profit",
                    d.bracket.short_take_profit,
                ),
                short_stop_loss: config.get_double(
                    "strategy",
                    "short_stop_loss",
                    d.bracket.short_stop_loss,
                ),
            },
        })
    }
}

/// Side and symbol of the most recent submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeMarker {
    pub side: OrderSide,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    NoSignal,
    InsufficientFunds { selection: Selection, sizing: Sizing },
    Submitted { order: Order, fill: Fill, liquidated: usize },
}

pub struct ArimaStrategy {
    params: StrategyParams,
    models: Vec<TrainedModel>,
    last_trade: Option<TradeMarker>,
}

impl ArimaStrategy {
    /// `models` order is the selection tie-break order.
    pub fn new(models: Vec<TrainedModel>, params: StrategyParams) -> Self {
        Self {
            params,
            models,
            last_trade: None,
        }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn models(&self) -> &[TrainedModel] {
        &self.models
    }

    pub fn last_trade(&self) -> Option<&TradeMarker> {
        self.last_trade.as_ref()
    }

    pub fn into_parts(self) -> (StrategyParams, Vec<TrainedModel>) {
        (self.params, self.models)
    }

    /// Forecast every symbol against the broker's current prices, in model order.
    pub fn forecasts(&self, broker: &dyn Broker) -> Vec<Result<Selection, ArimaTraderError>> {
        self.models
            .iter()
            .map(|trained| self.forecast_one(trained, broker))
            .collect()
    }

    fn forecast_one(
        &self,
        trained: &TrainedModel,
        broker: &dyn Broker,
    ) -> Result<Selection, ArimaTraderError> {
        let symbol = trained.symbol.as_str();
        let last_price = broker.get_last_price(symbol).ok_or_else(|| ArimaTraderError::NoData {
            symbol: symbol.to_string(),
        })?;
        let history = match self.params.forecast_from {
            ForecastAnchor::History => broker.price_history(symbol).ok_or_else(|| {
                ArimaTraderError::NoData {
                    symbol: symbol.to_string(),
                }
            })?,
            ForecastAnchor::Training => trained.model.train_series.as_slice(),
        };
        let pct_change = forecast_pct_change(
            &trained.model,
            history,
            last_price,
            self.params.forecast_horizon,
        )
        .map_err(|e| ArimaTraderError::model(symbol, e))?;
        debug!(symbol, pct_change, last_price, "forecast");
        Ok(Selection {
            symbol: symbol.to_string(),
            pct_change,
            last_price,
        })
    }

    /// One trading iteration: select, size, liquidate on a switch, submit.
    pub fn on_trading_iteration(
        &mut self,
        broker: &mut dyn Broker,
    ) -> Result<IterationOutcome, ArimaTraderError> {
        let Some(selection) = select_best(self.forecasts(&*broker)) else {
            return Ok(IterationOutcome::NoSignal);
        };

        let sizing = Sizing::new(broker.get_cash(), selection.last_price, self.params.cash_at_risk);
        if !sizing.is_tradeable() {
            debug!(
                symbol = %selection.symbol,
                cash = sizing.cash,
                last_price = sizing.last_price,
                "insufficient funds"
            );
            return Ok(IterationOutcome::InsufficientFunds { selection, sizing });
        }

        let order = self.params.bracket.order_for(
            &selection.symbol,
            sizing.quantity,
            selection.last_price,
            selection.pct_change,
        );

        let switching = self
            .last_trade
            .as_ref()
            .is_some_and(|m| m.side != order.side || m.symbol != order.symbol);
        let liquidated = if switching { broker.sell_all() } else { 0 };

        let fill = broker.submit_order(order.clone())?;
        info!(
            date = %broker.current_date(),
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            price = fill.price,
            pct_change = selection.pct_change,
            liquidated,
            "order filled"
        );
        self.last_trade = Some(TradeMarker {
            side: order.side,
            symbol: order.symbol.clone(),
        });
        Ok(IterationOutcome::Submitted {
            order,
            fill,
            liquidated,
        })
    }
}
