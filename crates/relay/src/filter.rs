//! Candidate selection.
//!
//! Turns a raw newest-first feed page into the ordered delivery queue for a
//! pass. Pure: no I/O, no mutation of the posts themselves.

use crate::changelog;
use crate::post::Post;
use crate::settings::Settings;
use crate::store::Cursor;

/// Why a post was left out of the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Repost,
    Reply,
    Keyword,
}

/// Select the posts to deliver in this pass, oldest first.
///
/// Only posts newer than the cursor are considered. Of those, reposts,
/// replies and keyword matches are dropped according to `settings`.
pub fn select_candidates(raw_page: &[Post], cursor: &Cursor, settings: &Settings) -> Vec<Post> {
    let keywords: Vec<String> = settings
        .ignore_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut candidates: Vec<Post> = changelog::unseen(raw_page, cursor.last_processed_uri.as_deref())
        .iter()
        .filter(|post| match exclusion(post, settings, &keywords) {
            Some(reason) => {
                tracing::debug!(uri = %post.uri, ?reason, "Filtered out post");
                false
            }
            None => true,
        })
        .cloned()
        .collect();

    candidates.reverse();
    candidates
}

/// First rule that excludes `post`, if any. `keywords` must be lowercased.
fn exclusion(post: &Post, settings: &Settings, keywords: &[String]) -> Option<Exclusion> {
    if settings.ignore_reposts && post.repost {
        return Some(Exclusion::Repost);
    }
    if settings.ignore_replies && post.reply {
        return Some(Exclusion::Reply);
    }
    // Posts without a valid body cannot match a keyword.
    if let Some(text) = &post.text {
        if !keywords.is_empty() {
            let text = text.to_lowercase();
            if keywords.iter().any(|kw| text.contains(kw.as_str())) {
                return Some(Exclusion::Keyword);
            }
        }
    }
    None
}
