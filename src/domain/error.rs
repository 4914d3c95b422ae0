//! Domain error types.

use chrono::{DateTime, Utc};

/// Top-level error type for hedgegrid.
///
/// `ConfigInvalid` and `ConfigParse` fail a run before any bar is
/// processed. `Data` stops the bar loop at the offending bar. `OrderRejected`
/// never aborts a run; the runner records it as a diagnostic and moves on.
#[derive(Debug, thiserror::Error)]
pub enum HedgeGridError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("bad bar #{index} at {timestamp}: {reason}")]
    Data {
        index: usize,
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("order {order_id} rejected: {reason}")]
    OrderRejected { order_id: u64, reason: String },

    #[error("csv error: {reason}")]
    Csv { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HedgeGridError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        HedgeGridError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            HedgeGridError::ConfigParse { .. } | HedgeGridError::ConfigInvalid { .. }
        )
    }
}

impl From<&HedgeGridError> for std::process::ExitCode {
    fn from(err: &HedgeGridError) -> Self {
        let code: u8 = match err {
            HedgeGridError::Io(_) | HedgeGridError::Json(_) => 1,
            HedgeGridError::ConfigParse { .. } | HedgeGridError::ConfigInvalid { .. } => 2,
            HedgeGridError::OrderRejected { .. } => 4,
            HedgeGridError::Data { .. } | HedgeGridError::Csv { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
