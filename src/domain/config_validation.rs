//! Configuration validation.
//!
//! Range checks on every numeric setting, run before training or a backtest.
//! Missing keys are fine everywhere; each reader has a default.

use crate::domain::error::ArimaTraderError;
use crate::ports::config_port::ConfigPort;

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_training_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_slippage(config)?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    validate_cash_at_risk(config)?;
    validate_bracket(config)?;
    Ok(())
}

pub fn validate_training_config(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    let fraction = config.get_double("training", "train_fraction", 0.8);
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(invalid(
            "training",
            "train_fraction",
            "train_fraction must be in (0, 1]",
        ));
    }
    let alpha = config.get_double("training", "alpha", 0.05);
    if alpha <= 0.0 || alpha >= 1.0 {
        return Err(invalid("training", "alpha", "alpha must be between 0 and 1"));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> ArimaTraderError {
    ArimaTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    let value = config.get_double("backtest", "initial_capital", 100_000.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    if config.get_double("backtest", "commission_per_trade", 0.0) < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_per_trade",
            "commission_per_trade must be non-negative",
        ));
    }
    if config.get_double("backtest", "commission_pct", 0.0) < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_pct",
            "commission_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    let value = config.get_double("backtest", "slippage_pct", 0.0);
    if !(0.0..100.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "slippage_pct",
            "slippage_pct must be in [0, 100)",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.05);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    let start = config.get_date("backtest", "start_date")?;
    let end = config.get_date("backtest", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

fn validate_cash_at_risk(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    let value = config.get_double("strategy", "cash_at_risk", 0.5);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "strategy",
            "cash_at_risk",
            "cash_at_risk must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_bracket(config: &dyn ConfigPort) -> Result<(), ArimaTraderError> {
    // (key, default, must be above 1)
    let checks = [
        ("long_take_profit", 1.20, true),
        ("long_stop_loss", 0.95, false),
        ("short_take_profit", 0.80, false),
        ("short_stop_loss", 1.05, true),
    ];
    for (key, default, above_one) in checks {
        let value = config.get_double("strategy", key, default);
        let ok = if above_one {
            value > 1.0
        } else {
            value > 0.0 && value < 1.0
        };
        if !ok {
            let reason = if above_one {
                format!("{key} must be greater than 1")
            } else {
                format!("{key} must be between 0 and 1")
            };
            return Err(invalid("strategy", key, &reason));
        }
    }
    Ok(())
}
