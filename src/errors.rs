//! Unified error types and result handling.
//!
//! Validation and coercion problems (malformed amounts, missing fields) are
//! never surfaced as errors; they are resolved to safe defaults at the edge
//! of the state store. The variants here cover the failures that genuinely
//! need to propagate: configuration, local storage, remote I/O and backup
//! handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Local storage error: {message}")]
    Storage { message: String },

    #[error("Remote backend error: {message}")]
    Remote { message: String },

    #[error("Not a valid MetaFlow backup: {message}")]
    InvalidBackup { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
