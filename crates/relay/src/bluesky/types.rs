//! Bluesky XRPC wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::post::{Author, ImageRef, LinkCard, Post, PostEmbed};

/// Record type of a regular post.
const POST_RECORD_TYPE: &str = "app.bsky.feed.post";
/// Feed reason attached to reposts.
const REASON_REPOST: &str = "app.bsky.feed.defs#reasonRepost";

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionResponse {
    pub access_jwt: String,
    #[serde(default)]
    pub refresh_jwt: Option<String>,
    pub did: String,
    pub handle: String,
}

/// Error body returned by XRPC endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct XrpcError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorFeedResponse {
    #[serde(default)]
    pub feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedViewPost {
    pub post: PostView,
    #[serde(default)]
    pub reason: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostView {
    pub uri: String,
    pub author: ProfileView,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub embed: Option<Value>,
    #[serde(default)]
    pub indexed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileView {
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// The parts of an `app.bsky.feed.post` record the relay reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord {
    #[serde(rename = "$type")]
    kind: String,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    reply: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "$type")]
enum EmbedView {
    #[serde(rename = "app.bsky.embed.images#view")]
    Images { images: Vec<ImageView> },
    #[serde(rename = "app.bsky.embed.external#view")]
    External { external: ExternalView },
    #[serde(rename = "app.bsky.embed.recordWithMedia#view")]
    RecordWithMedia { media: Box<EmbedView> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ImageView {
    thumb: String,
    fullsize: String,
    #[serde(default)]
    alt: String,
}

#[derive(Debug, Deserialize)]
struct ExternalView {
    uri: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumb: Option<String>,
}

impl EmbedView {
    fn into_embed(self) -> Option<PostEmbed> {
        match self {
            Self::Images { images } if !images.is_empty() => Some(PostEmbed::Images {
                images: images
                    .into_iter()
                    .map(|i| ImageRef {
                        fullsize: i.fullsize,
                        thumb: i.thumb,
                        alt: i.alt,
                    })
                    .collect(),
            }),
            Self::External { external } => Some(PostEmbed::External {
                card: LinkCard {
                    uri: external.uri,
                    title: external.title,
                    description: external.description,
                    thumb: external.thumb,
                },
            }),
            Self::RecordWithMedia { media } => media.into_embed(),
            Self::Images { .. } | Self::Other => None,
        }
    }
}

impl FeedViewPost {
    /// Convert a feed item into a [`Post`].
    ///
    /// A record that is not a valid post record keeps the item in the feed
    /// with no body and no reply marker.
    pub(crate) fn into_post(self) -> Post {
        let repost = self
            .reason
            .as_ref()
            .and_then(|r| r.get("$type"))
            .and_then(Value::as_str)
            .is_some_and(|t| t == REASON_REPOST);

        let PostView {
            uri,
            author,
            record,
            embed,
            indexed_at,
        } = self.post;

        let record = serde_json::from_value::<PostRecord>(record)
            .ok()
            .filter(|r| r.kind == POST_RECORD_TYPE);

        let (text, reply, created_at) = match record {
            Some(r) => (Some(r.text), r.reply.is_some(), r.created_at),
            None => (None, false, None),
        };

        let embed = embed
            .and_then(|v| serde_json::from_value::<EmbedView>(v).ok())
            .and_then(EmbedView::into_embed);

        Post {
            uri,
            author: Author {
                handle: author.handle,
                display_name: author.display_name,
                avatar: author.avatar,
            },
            text,
            created_at: created_at
                .as_deref()
                .and_then(parse_timestamp)
                .or_else(|| indexed_at.as_deref().and_then(parse_timestamp))
                .unwrap_or_else(Utc::now),
            reply,
            repost,
            embed,
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
