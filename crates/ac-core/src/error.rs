//! Error types for ac-core

use thiserror::Error;

/// Main error type for ac-core
#[derive(Error, Debug)]
pub enum Error {
    /// A malformed allow-list entry. Callers skip the entry and keep going.
    #[error("Invalid allowlist pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A command referenced a URL that has no usable origin.
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    /// The native activation call on an element raised.
    #[error("Activation failed: {0}")]
    ActivationFailure(String),

    /// The persistence layer could not serve the request.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable error code used in `{ok: false, error}` responses.
    pub fn code(&self) -> String {
        match self {
            Self::InvalidOrigin(_) => "invalid_origin".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for ac-core
pub type Result<T> = std::result::Result<T, Error>;
