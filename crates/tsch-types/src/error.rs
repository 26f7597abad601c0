use thiserror::Error;

#[derive(Error, Debug)]
pub enum TschError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("MAC rejected schedule edit (slot={slot:?}): {reason}")]
    DeployRejected { slot: Option<usize>, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TschResult<T> = Result<T, TschError>;
