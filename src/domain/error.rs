//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for weightbench.
///
/// A ticker with no observation is not an error: it is
/// [`FetchOutcome::NotFound`](crate::domain::observation::FetchOutcome) and is
/// absorbed by the engines. Only failures that stop a command or a whole
/// strategy run are represented here.
#[derive(Debug, thiserror::Error)]
pub enum WeightbenchError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("fetch failed for {ticker} on {date}: {reason}")]
    Fetch {
        ticker: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("no year between {start_year} and {end_year} produced priced data for strategy {strategy}")]
    ExhaustedData {
        strategy: String,
        start_year: i32,
        end_year: i32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WeightbenchError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        WeightbenchError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&WeightbenchError> for std::process::ExitCode {
    fn from(err: &WeightbenchError) -> Self {
        let code: u8 = match err {
            WeightbenchError::Io(_) => 1,
            WeightbenchError::ConfigParse { .. }
            | WeightbenchError::ConfigMissing { .. }
            | WeightbenchError::ConfigInvalid { .. } => 2,
            WeightbenchError::Database { .. } | WeightbenchError::DatabaseQuery { .. } => 3,
            WeightbenchError::Fetch { .. } | WeightbenchError::ExhaustedData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
