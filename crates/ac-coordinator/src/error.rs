//! Error types for ac-coordinator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Core(#[from] ac_core::Error),

    #[error("Coordinator service stopped")]
    ServiceStopped,
}

impl CoordinatorError {
    /// Value for the `error` field of a failure response.
    pub fn code(&self) -> String {
        match self {
            Self::Core(e) => e.code(),
            Self::ServiceStopped => "service_stopped".to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoordinatorError>;
