//! Domain error types.

/// Top-level error type for shorttrader.
#[derive(Debug, thiserror::Error)]
pub enum ShortTraderError {
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

    #[error("bar data error: {reason}")]
    Data { reason: String },

    #[error("no bars for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient bars for {symbol}: have {bars}, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid saved parameters in {path}: {reason}")]
    Params { path: String, reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShortTraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ShortTraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ShortTraderError> for std::process::ExitCode {
    fn from(err: &ShortTraderError) -> Self {
        let code: u8 = match err {
            ShortTraderError::Io(_) => 1,
            ShortTraderError::ConfigParse { .. }
            | ShortTraderError::ConfigMissing { .. }
            | ShortTraderError::ConfigInvalid { .. } => 2,
            ShortTraderError::Data { .. }
            | ShortTraderError::NoData { .. }
            | ShortTraderError::InsufficientData { .. } => 3,
            ShortTraderError::Params { .. } | ShortTraderError::Json(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
