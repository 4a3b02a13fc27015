//! Error types for destination channels.

use thiserror::Error;

/// Errors that can occur when talking to a destination channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    /// The configured channel exists but cannot receive relayed posts
    #[error("Channel {channel_id} is not a guild text channel (type {kind})")]
    InvalidChannel { channel_id: String, kind: u8 },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rate limited by the service
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The service answered with a non-success status
    #[error("Request rejected with {status}: {body}")]
    Rejected { status: u16, body: String },
}
