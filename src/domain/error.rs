//! Domain error types.

/// Failure while fitting or forecasting an ARIMA model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("series too short for ARIMA({p},{d},{q}): have {have} observations, need {need}")]
    SeriesTooShort {
        p: usize,
        d: usize,
        q: usize,
        have: usize,
        need: usize,
    },

    #[error("singular design matrix while fitting ARIMA({p},{d},{q})")]
    Singular { p: usize, d: usize, q: usize },

    #[error("unstable fit for ARIMA({p},{d},{q}): residuals diverged")]
    Unstable { p: usize, d: usize, q: usize },

    #[error("invalid series: {reason}")]
    InvalidSeries { reason: String },

    #[error("no candidate model could be fitted")]
    NoCandidate,

    #[error("invalid forecast: {reason}")]
    Forecast { reason: String },
}

/// Top-level error type for arimatrader.
#[derive(Debug, thiserror::Error)]
pub enum ArimaTraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("model error for {symbol}: {source}")]
    Model {
        symbol: String,
        #[source]
        source: ModelError,
    },

    #[error("model not found for {symbol}: {location}")]
    ModelNotFound { symbol: String, location: String },

    #[error("unreadable model artifact {location}: {reason}")]
    ModelFormat { location: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ArimaTraderError {
    pub fn model(symbol: &str, source: ModelError) -> Self {
        ArimaTraderError::Model {
            symbol: symbol.to_string(),
            source,
        }
    }
}

impl From<&ArimaTraderError> for std::process::ExitCode {
    fn from(err: &ArimaTraderError) -> Self {
        let code: u8 = match err {
            ArimaTraderError::Io(_) | ArimaTraderError::Report { .. } => 1,
            ArimaTraderError::ConfigParse { .. }
            | ArimaTraderError::ConfigMissing { .. }
            | ArimaTraderError::ConfigInvalid { .. } => 2,
            ArimaTraderError::Data { .. } => 3,
            ArimaTraderError::Model { .. }
            | ArimaTraderError::ModelNotFound { .. }
            | ArimaTraderError::ModelFormat { .. }
            | ArimaTraderError::OrderRejected { .. } => 4,
            ArimaTraderError::NoData { .. } | ArimaTraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_message_names_order() {
        let err = ModelError::SeriesTooShort {
            p: 2,
            d: 1,
            q: 1,
            have: 5,
            need: 14,
        };
        assert_eq!(
            err.to_string(),
            "series too short for ARIMA(2,1,1): have 5 observations, need 14"
        );
    }

    #[test]
    fn wrapped_model_error_keeps_symbol() {
        let err = ArimaTraderError::model("GOOG", ModelError::NoCandidate);
        assert_eq!(
            err.to_string(),
            "model error for GOOG: no candidate model could be fitted"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn config_errors_render_section_and_key() {
        let err = ArimaTraderError::ConfigInvalid {
            section: "strategy".into(),
            key: "cash_at_risk".into(),
            reason: "must be in (0, 1]".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] cash_at_risk: must be in (0, 1]"
        );
    }
}
