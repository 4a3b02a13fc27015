//! Post source abstraction.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::post::Post;

/// Somewhere posts come from.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Establish (or re-establish) a session.
    async fn authenticate(&self) -> Result<(), SourceError>;

    /// The most recent posts of `actor`, newest first, at most `limit`.
    async fn fetch_recent_posts(&self, actor: &str, limit: u32) -> Result<Vec<Post>, SourceError>;
}
