//! Domain error types.

use std::fmt;

/// Which protective leg of a bracket failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketLeg {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for BracketLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketLeg::StopLoss => write!(f, "stop-loss"),
            BracketLeg::TakeProfit => write!(f, "take-profit"),
        }
    }
}

/// Top-level error type for sigtrader.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
    #[error("invalid candle data: {reason}")]
    Data { reason: String },

    #[error("insufficient data for {what}: have {bars} bars, need {minimum}")]
    InsufficientData {
        what: String,
        bars: usize,
        minimum: usize,
    },

    #[error("precision unavailable for {symbol}")]
    PrecisionUnavailable { symbol: String },

    #[error("order sizing rejected for {symbol}: {reason}")]
    SizingRejected { symbol: String, reason: String },

    #[error("invalid order request: {reason}")]
    InvalidOrder { reason: String },

    #[error("entry order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("{leg} leg failed for {symbol}: {reason}")]
    BracketLegFailed {
        symbol: String,
        leg: BracketLeg,
        reason: String,
    },

    #[error("exchange error: {reason}")]
    TransientExchange { reason: String },

    #[error("notification failed: {reason}")]
    Notification { reason: String },

    #[error("history store error: {reason}")]
    History { reason: String },

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

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SigtraderError {
    /// Whether the caller may retry the failed operation later.
    pub fn is_transient(&self) -> bool {
        matches!(self, SigtraderError::TransientExchange { .. })
    }

    pub(crate) fn data(reason: impl Into<String>) -> Self {
        SigtraderError::Data {
            reason: reason.into(),
        }
    }

    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SigtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) | SigtraderError::History { .. } => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. } => 2,
            SigtraderError::Data { .. } | SigtraderError::InsufficientData { .. } => 3,
            SigtraderError::PrecisionUnavailable { .. }
            | SigtraderError::SizingRejected { .. }
            | SigtraderError::InvalidOrder { .. }
            | SigtraderError::OrderRejected { .. }
            | SigtraderError::BracketLegFailed { .. }
            | SigtraderError::TransientExchange { .. }
            | SigtraderError::Notification { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
