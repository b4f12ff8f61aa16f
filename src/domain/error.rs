//! Domain error types.

/// Top-level error type for candlescope.
#[derive(Debug, thiserror::Error)]
pub enum CandlescopeError {
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

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("notification error: {reason}")]
    Notification { reason: String },

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CandlescopeError {
    pub fn data(reason: impl Into<String>) -> Self {
        CandlescopeError::Data {
            reason: reason.into(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        CandlescopeError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Configuration errors are surfaced to the caller instead of being
    /// recorded on a failed result.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CandlescopeError::ConfigParse { .. }
                | CandlescopeError::ConfigMissing { .. }
                | CandlescopeError::ConfigInvalid { .. }
        )
    }
}

impl From<&CandlescopeError> for std::process::ExitCode {
    fn from(err: &CandlescopeError) -> Self {
        let code: u8 = match err {
            CandlescopeError::Io(_) | CandlescopeError::Json(_) => 1,
            CandlescopeError::ConfigParse { .. }
            | CandlescopeError::ConfigMissing { .. }
            | CandlescopeError::ConfigInvalid { .. } => 2,
            CandlescopeError::Storage { .. } => 3,
            CandlescopeError::Data { .. } => 5,
            CandlescopeError::Cancelled { .. } => 6,
            CandlescopeError::Notification { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
