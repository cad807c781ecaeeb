//! Domain error types.

/// Top-level error type for meridian.
#[derive(Debug, thiserror::Error)]
pub enum MeridianError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("dimension mismatch: expected {expected} points, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid action: {reason}")]
    InvalidAction { reason: String },

    #[error("empty dataset")]
    EmptyDataset,

    #[error("timestamps not strictly increasing at row {index}")]
    UnorderedTimestamps { index: usize },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("backtest cancelled after {bars_processed} bars")]
    Cancelled { bars_processed: usize },

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

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MeridianError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        MeridianError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_action(reason: impl Into<String>) -> Self {
        MeridianError::InvalidAction {
            reason: reason.into(),
        }
    }

    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        MeridianError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&MeridianError> for std::process::ExitCode {
    fn from(err: &MeridianError) -> Self {
        let code: u8 = match err {
            MeridianError::Io(_) => 1,
            MeridianError::ConfigParse { .. }
            | MeridianError::ConfigMissing { .. }
            | MeridianError::ConfigInvalid { .. } => 2,
            MeridianError::Data { .. }
            | MeridianError::EmptyDataset
            | MeridianError::UnorderedTimestamps { .. } => 3,
            MeridianError::InvalidAction { .. } | MeridianError::OrderRejected { .. } => 4,
            MeridianError::InvalidParameter { .. } | MeridianError::DimensionMismatch { .. } => 5,
            MeridianError::Cancelled { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
