use thiserror::Error;

pub type Result<T> = std::result::Result<T, SelectionError>;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Invalid priority 0 for creative {creative_id}")]
    InvalidPriority { creative_id: String },

    #[error("Source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SelectionError {
    fn from(err: serde_json::Error) -> Self {
        SelectionError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SelectionError {
    fn from(err: std::io::Error) -> Self {
        SelectionError::Source(err.to_string())
    }
}

impl From<config::ConfigError> for SelectionError {
    fn from(err: config::ConfigError) -> Self {
        SelectionError::Configuration(err.to_string())
    }
}
