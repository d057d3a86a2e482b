//! Error types for the Zoobae core.
//!
//! Generation and extraction errors are recovered inside the responder (fallback branches);
//! only [`CoreError`] ever reaches a caller of the orchestrator.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The hosted generation capability could not produce text.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation unavailable: {0}")]
    Unavailable(String),

    #[error("generation API error {code}: {body}")]
    Status { code: u16, body: String },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation returned no content")]
    Empty,
}

/// Structured insight extraction failed; callers fall back to the keyword extractor.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("malformed extraction: {0}")]
    Malformed(String),
}

/// Errors surfaced by the orchestrator, stores and configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] sled::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no chat history found")]
    HistoryEmpty,

    #[error("user not found")]
    UserNotFound,

    #[error("email already registered: {0}")]
    DuplicateUser(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigLoad(#[from] config::ConfigError),
}
