//! Error types for the cleaner

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CleanerError>;

#[derive(Debug, Error)]
pub enum CleanerError {
    #[error("DOM error: {0}")]
    Dom(#[from] dom::DomError),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
