//! Error types shared across TalentFlow crates

use thiserror::Error;

/// Result type alias for TalentFlow operations
pub type Result<T> = std::result::Result<T, TalentError>;

/// Main error type for cross-crate concerns
#[derive(Error, Debug)]
pub enum TalentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
