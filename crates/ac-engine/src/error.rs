//! Error types for ac-engine

use thiserror::Error;

/// ac-engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid container selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Page fixture error: {0}")]
    Fixture(String),

    #[error("Page context stopped")]
    ContextClosed,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] ac_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;
