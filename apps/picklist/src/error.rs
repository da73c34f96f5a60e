//! # Error Types
//!
//! `FetchError` covers one remote page fetch. `AppError` covers everything the
//! binary can fail at: configuration, files, scripts and the server socket.
//!
//! Fetch errors never reach a picker: the registry turns them into a
//! [`picklist_core::PageOutcome`] and logs them.

use picklist_core::PicklistError;
use thiserror::Error;

/// Errors from a single remote page fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// Backend answered with something that is not a record page.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Errors surfaced by CLI commands and the server.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] PicklistError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Settings are missing or contradictory.
    #[error("configuration error: {0}")]
    Config(String),

    /// A script line could not be parsed.
    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },
}
