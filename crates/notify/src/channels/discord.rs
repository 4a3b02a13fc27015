//! Discord bot channel.
//!
//! Talks to the Discord REST API directly with a bot token. Only the two
//! endpoints the relay needs are used: channel lookup (startup check) and
//! message creation.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::message::Message;
use crate::NotifyChannel;

/// Default Discord REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// `GUILD_TEXT` channel type.
const CHANNEL_TYPE_GUILD_TEXT: u8 = 0;
/// `GUILD_ANNOUNCEMENT` channel type.
const CHANNEL_TYPE_GUILD_ANNOUNCEMENT: u8 = 5;

/// Discord channel addressed by id, authenticated with a bot token.
pub struct DiscordChannel {
    token: String,
    channel_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl DiscordChannel {
    /// Create a Discord channel for the given bot token and channel id.
    #[must_use]
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel_id: channel_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the REST API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Channel id this instance delivers to.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn channel_url(&self) -> String {
        format!("{}/channels/{}", self.api_base, self.channel_id)
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Turn a non-success response into a [`ChannelError`].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn error_from_response(response: reqwest::Response) -> ChannelError {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let header_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok());
            let body_secs = response
                .json::<RateLimitBody>()
                .await
                .ok()
                .map(|b| b.retry_after);

            let retry_after = body_secs.or(header_secs).unwrap_or(1.0);
            return ChannelError::RateLimited {
                retry_after_secs: retry_after.ceil().max(0.0) as u64,
            };
        }

        let body = response.text().await.unwrap_or_default();
        ChannelError::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}

impl fmt::Debug for DiscordChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordChannel")
            .field("channel_id", &self.channel_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NotifyChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn initialize(&self) -> Result<(), ChannelError> {
        if self.token.is_empty() {
            return Err(ChannelError::NotConfigured("DISCORD_TOKEN".to_string()));
        }
        if self.channel_id.is_empty() {
            return Err(ChannelError::NotConfigured("DISCORD_CHANNEL_ID".to_string()));
        }

        let response = self
            .client
            .get(self.channel_url())
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let channel: ChannelInfo = response.json().await?;
        match channel.kind {
            CHANNEL_TYPE_GUILD_TEXT | CHANNEL_TYPE_GUILD_ANNOUNCEMENT => {
                info!(
                    channel = "discord",
                    channel_id = %self.channel_id,
                    channel_name = channel.name.as_deref().unwrap_or("unknown"),
                    "Discord channel ready"
                );
                Ok(())
            }
            kind => Err(ChannelError::InvalidChannel {
                channel_id: self.channel_id.clone(),
                kind,
            }),
        }
    }

    async fn send(&self, message: &Message) -> Result<(), ChannelError> {
        debug!(channel = "discord", channel_id = %self.channel_id, "Sending message");

        let response = self
            .client
            .post(format!("{}/messages", self.channel_url()))
            .header(AUTHORIZATION, self.auth_header())
            .json(message)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(channel = "discord", "Message sent successfully");
            Ok(())
        } else {
            let err = Self::error_from_response(response).await;
            warn!(channel = "discord", error = %err, "Discord message request failed");
            Err(err)
        }
    }
}

// =============================================================================
// Discord API types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}
