//! Error types for the relay.

use thiserror::Error;

use crate::settings::ValidationError;

/// Errors from the post source (Bluesky).
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Login was refused or no credentials are configured
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service answered with an XRPC error
    #[error("API error {status} ({error}): {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },

    /// The response could not be understood
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors from the cursor, settings and history stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A settings update was rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors that abort a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching the feed failed; nothing was delivered
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Reading the cursor or settings failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
