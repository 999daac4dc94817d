use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    /// Store or directory unreachable. Aborts the whole run.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    #[error("Missing required field: {0}")]
    Validation(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Content safety check failed: {0}")]
    ContentSafety(String),

    #[error("Source adapter error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl ImportError {
    /// Errors that must abort a run instead of being recorded per event.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ImportError::Infrastructure(_))
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
