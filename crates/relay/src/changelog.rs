//! Cursor-based changelog window.
//!
//! A feed page is a newest-first slice of a changelog. The cursor names the
//! last entry already consumed; everything in front of it is unseen.

use crate::post::Post;

/// An entry with a stable, unique key.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Post {
    fn key(&self) -> &str {
        &self.uri
    }
}

/// Entries of a newest-first `page` that are strictly newer than `cursor`.
///
/// Scanning stops at the first entry whose key equals the cursor; that entry
/// and everything older is excluded. With no cursor, or a cursor that does
/// not appear in the page, the whole page is unseen.
pub fn unseen<'a, T: Keyed>(page: &'a [T], cursor: Option<&str>) -> &'a [T] {
    let Some(cursor) = cursor else {
        return page;
    };

    match page.iter().position(|entry| entry.key() == cursor) {
        Some(stop) => &page[..stop],
        None => page,
    }
}
