//! Destination channels for relayed posts.
//!
//! This crate provides the outbound half of the relay: a small message model
//! and a channel abstraction that delivers one message per call, plus the
//! Discord implementation used in production.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{DiscordChannel, Message, NotifyChannel};
//!
//! # async fn run() -> Result<(), notify::ChannelError> {
//! let channel = DiscordChannel::new("bot-token", "1234567890");
//! channel.initialize().await?;
//! channel.send(&Message::new("hello")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`NotifyChannel`] trait defines the interface for destination channels
//! - [`DiscordChannel`] implements it over the Discord REST API
//! - [`Message`] and [`Embed`] describe what gets sent
//!
//! Channels never retry. A failed send is reported to the caller, which
//! decides what to do with it.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod message;

pub use channels::discord::{DiscordChannel, DEFAULT_API_BASE as DISCORD_API_BASE};
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use message::{Embed, EmbedAuthor, EmbedField, EmbedImage, Message};
