//! Renders posts as destination messages.

use notify::{Embed, EmbedAuthor, Message};

use crate::post::{Post, PostEmbed};

/// Embed accent colour.
pub const EMBED_COLOR: u32 = 0x0084_ff;

/// Render `post` as a message with a link and one rich embed.
pub fn render_post(post: &Post) -> Message {
    let url = post.web_url();
    let handle = &post.author.handle;

    let mut embed = Embed::default().description(post.text.as_deref().unwrap_or_default());
    embed.author = Some(EmbedAuthor {
        name: format!("{} (@{handle})", post.author.name()),
        icon_url: post.author.avatar.clone(),
    });
    embed.url = Some(url.clone());
    embed.color = Some(EMBED_COLOR);
    embed.timestamp = Some(post.created_at);

    match &post.embed {
        Some(PostEmbed::Images { images }) => {
            // Discord shows a single image per embed.
            if let Some(first) = images.first() {
                embed.set_image_if_absent(first.fullsize.clone());
            }
        }
        Some(PostEmbed::External { card }) => {
            let title = if card.title.trim().is_empty() {
                card.uri.as_str()
            } else {
                card.title.as_str()
            };
            embed.push_field("Link", &format!("[{title}]({})", card.uri));
            if let Some(thumb) = &card.thumb {
                embed.set_image_if_absent(thumb.clone());
            }
        }
        None => {}
    }

    Message::new(format!("New post on Bluesky:\n{url}")).with_embed(embed)
}
