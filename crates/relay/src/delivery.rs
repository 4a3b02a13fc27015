//! Delivery adapter.
//!
//! One post in, one outbound message, one outcome out. Transport errors are
//! folded into [`DeliveryOutcome::Failed`]; retrying is the caller's call.

use std::sync::Arc;

use notify::NotifyChannel;
use tracing::{info, warn};

use crate::format::render_post;
use crate::post::Post;

/// Result of delivering one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Delivers posts to a destination channel.
#[derive(Clone)]
pub struct Deliverer {
    channel: Arc<dyn NotifyChannel>,
}

impl Deliverer {
    #[must_use]
    pub fn new(channel: Arc<dyn NotifyChannel>) -> Self {
        Self { channel }
    }

    /// Send exactly one message for `post`.
    pub async fn deliver(&self, post: &Post) -> DeliveryOutcome {
        let message = render_post(post);

        match self.channel.send(&message).await {
            Ok(()) => {
                info!(
                    channel = self.channel.name(),
                    uri = %post.uri,
                    rkey = post.rkey(),
                    "Delivered post"
                );
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(
                    channel = self.channel.name(),
                    uri = %post.uri,
                    error = %e,
                    "Failed to deliver post"
                );
                DeliveryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
