//! Outbound message model.
//!
//! Mirrors the subset of the Discord message payload the relay renders:
//! plain content plus a list of rich embeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of an embed description accepted by Discord.
pub const MAX_DESCRIPTION_CHARS: usize = 4096;

/// Maximum length of an embed field value accepted by Discord.
pub const MAX_FIELD_VALUE_CHARS: usize = 1024;

/// A message to deliver to a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Plain text content shown above the embeds.
    pub content: String,
    /// Rich embeds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

impl Message {
    /// Create a message with plain content and no embeds.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embeds: Vec::new(),
        }
    }

    /// Attach an embed.
    #[must_use]
    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

/// A rich embed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    /// Set the description, truncated to [`MAX_DESCRIPTION_CHARS`].
    ///
    /// Empty text clears the description since Discord rejects empty strings.
    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = if text.is_empty() {
            None
        } else {
            Some(truncate_chars(text, MAX_DESCRIPTION_CHARS))
        };
        self
    }

    /// Set the image unless one is already present.
    pub fn set_image_if_absent(&mut self, url: impl Into<String>) {
        if self.image.is_none() {
            self.image = Some(EmbedImage { url: url.into() });
        }
    }

    /// Append an inline-less field.
    pub fn push_field(&mut self, name: impl Into<String>, value: &str) {
        self.fields.push(EmbedField {
            name: name.into(),
            value: truncate_chars(value, MAX_FIELD_VALUE_CHARS),
            inline: false,
        });
    }
}

/// Embed author line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Embed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

/// Embed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Truncate text to `max` characters, respecting UTF-8 boundaries.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(max - 1).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_description_is_omitted() {
        let embed = Embed::default().description("");
        assert!(embed.description.is_none());

        let json = serde_json::to_value(&embed).unwrap();
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_long_description_is_truncated() {
        let text = "é".repeat(MAX_DESCRIPTION_CHARS + 10);
        let embed = Embed::default().description(&text);
        let description = embed.description.unwrap();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(description.ends_with('…'));
    }

    #[test]
    fn test_image_is_not_overwritten() {
        let mut embed = Embed::default();
        embed.set_image_if_absent("https://cdn.example/first.jpg");
        embed.set_image_if_absent("https://cdn.example/second.jpg");
        assert_eq!(embed.image.unwrap().url, "https://cdn.example/first.jpg");
    }

    #[test]
    fn test_message_payload_shape() {
        let mut embed = Embed::default().description("hello");
        embed.color = Some(0x0084ff);
        embed.push_field("Link", "[title](https://example.com)");
        let message = Message::new("New post").with_embed(embed);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["content"], "New post");
        assert_eq!(json["embeds"][0]["description"], "hello");
        assert_eq!(json["embeds"][0]["color"], 0x0084ff);
        assert_eq!(json["embeds"][0]["fields"][0]["name"], "Link");
        assert_eq!(json["embeds"][0]["fields"][0]["inline"], false);
    }
}
