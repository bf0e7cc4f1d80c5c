//! Shared error types.
//!
//! The `Display` text of [`ServerUrlError`] is shown to the user verbatim as the
//! session failure reason, so keep it short and human-readable.

use thiserror::Error;

/// Why a configured server URL was rejected before any connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerUrlError {
    #[error("Invalid server URL")]
    Invalid(#[from] url::ParseError),
    #[error("Server URL must start with ws:// or wss://")]
    Scheme(String),
}

/// A server push that could not be merged into the session snapshot.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("malformed server push: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server push is not a JSON object")]
    NotAnObject,
}
