//! Common error types for the CRM application layer

use thiserror::Error;

use crate::chat::ChatError;

/// Common result type for CRM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the CRM crates
#[derive(Error, Debug)]
pub enum Error {
    /// The backend answered with a non-null `error` payload
    #[error("Backend error: {message}")]
    Backend {
        message: String,
        code: Option<String>,
    },

    /// Transport failure talking to the backend (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row or payload could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed CSV input or writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local validation failure; no request was sent
    #[error("Validation failed: {0}")]
    Validation(String),

    /// AI chat stream failure
    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl Error {
    /// True when the failure was caught locally before any request
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
