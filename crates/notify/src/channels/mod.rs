//! Destination channel implementations.

pub mod discord;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::message::Message;

/// Trait for destination channels (Discord, ...).
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Verify the channel is reachable and able to receive messages.
    async fn initialize(&self) -> Result<(), ChannelError>;

    /// Send a single message. Implementations must not retry.
    async fn send(&self, message: &Message) -> Result<(), ChannelError>;
}
