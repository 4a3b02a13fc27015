//! Source post types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public web host used to build post links.
const WEB_HOST: &str = "https://bsky.app";

/// A post from the mirrored account's feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Unique, stable post URI (`at://did/app.bsky.feed.post/rkey`).
    pub uri: String,
    /// Post author.
    pub author: Author,
    /// Body text. `None` when the record is not a valid post record.
    pub text: Option<String>,
    /// When the post was created.
    pub created_at: DateTime<Utc>,
    /// Whether the post replies to another post.
    #[serde(default)]
    pub reply: bool,
    /// Whether this feed item is a repost of someone else's post.
    #[serde(default)]
    pub repost: bool,
    /// Attached media or link card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<PostEmbed>,
}

impl Post {
    /// Create a plain post with minimal required fields.
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        author: Author,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uri: uri.into(),
            author,
            text: Some(text.into()),
            created_at,
            reply: false,
            repost: false,
            embed: None,
        }
    }

    /// Record key: the last path segment of the URI.
    #[must_use]
    pub fn rkey(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }

    /// Public link to the post.
    #[must_use]
    pub fn web_url(&self) -> String {
        format!(
            "{WEB_HOST}/profile/{}/post/{}",
            self.author.handle,
            self.rkey()
        )
    }
}

/// Author information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Handle (without @).
    pub handle: String,
    /// Display name, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Avatar image URL, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Author {
    /// Create a new author.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            display_name: None,
            avatar: None,
        }
    }

    /// Display name, falling back to the handle when unset or blank.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.handle)
    }
}

/// Embedded content attached to a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PostEmbed {
    /// Image gallery.
    Images { images: Vec<ImageRef> },
    /// External link card.
    External { card: LinkCard },
}

/// An embedded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Full-size image URL.
    pub fullsize: String,
    /// Thumbnail URL.
    pub thumb: String,
    /// Alt text.
    #[serde(default)]
    pub alt: String,
}

/// An external link card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCard {
    pub uri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
}
