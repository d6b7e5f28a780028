use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ForecastError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ForecastError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
