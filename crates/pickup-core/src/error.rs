use std::path::PathBuf;

use thiserror::Error;

/// Failure to load or validate static configuration (rules, gazetteer).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure reported by an external collaborator (splitter, search store,
/// speech-to-text). Surfaced unchanged to the caller, never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("backend rejected query: {0}")]
    Query(String),
}
