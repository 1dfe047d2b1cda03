//! Domain error types.

use chrono::{DateTime, Utc};

/// Top-level error type for confluence.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
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

    #[error("malformed message: {reason}")]
    MalformedMessage { reason: String },

    #[error("candle at {timestamp} rejected: latest buffered candle is {latest}")]
    DuplicateOrOutOfOrderCandle {
        timestamp: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    #[error("insufficient history: have {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("connection lost for {symbol}: {reason}")]
    ConnectionLost { symbol: String, reason: String },

    #[error("gave up reconnecting {symbol} after {attempts} attempts")]
    ReconnectExhausted { symbol: String, attempts: u32 },

    #[error("callback failed: {reason}")]
    CallbackFailure { reason: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfluenceError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ConfluenceError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ConfluenceError> for std::process::ExitCode {
    fn from(err: &ConfluenceError) -> Self {
        let code: u8 = match err {
            ConfluenceError::Io(_) => 1,
            ConfluenceError::ConfigParse { .. }
            | ConfluenceError::ConfigMissing { .. }
            | ConfluenceError::ConfigInvalid { .. } => 2,
            ConfluenceError::DataSource { .. } => 3,
            ConfluenceError::MalformedMessage { .. }
            | ConfluenceError::ConnectionLost { .. }
            | ConfluenceError::ReconnectExhausted { .. }
            | ConfluenceError::CallbackFailure { .. } => 4,
            ConfluenceError::DuplicateOrOutOfOrderCandle { .. }
            | ConfluenceError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
