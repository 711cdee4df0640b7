//! Bookmark → search document transformation.
//!
//! The transformer is the single source of truth for the engine document
//! shape. Every sync path regenerates the whole document from the
//! canonical bookmark, so an upsert retry always writes identical bytes.

use crate::models::{Bookmark, SearchDocument};

/// Project a canonical [`Bookmark`] into the flat engine document.
///
/// Pure and total: no I/O, no failure path. Every optional source field
/// gets an explicit default — empty string for text, empty vec for tags —
/// because the engine schema has no nullable fields. Timestamps are
/// converted to epoch seconds; a bookmark that has never been edited
/// carries its creation time as `updated_at`.
pub fn to_search_document(bookmark: &Bookmark) -> SearchDocument {
    let created_at = bookmark.created_at.timestamp();
    let updated_at = bookmark
        .updated_at
        .map(|t| t.timestamp())
        .unwrap_or(created_at);

    SearchDocument {
        id: bookmark.id.clone(),
        title: bookmark.title.clone(),
        description: bookmark.description.clone().unwrap_or_default(),
        url: bookmark.url.clone(),
        content_type: bookmark.content_type.as_str().to_string(),
        ai_summary: bookmark.ai_summary.clone().unwrap_or_default(),
        ai_tags: bookmark.ai_tags.clone().unwrap_or_default(),
        user_id: bookmark.user_id.clone(),
        collection_id: bookmark.collection_id.clone().unwrap_or_default(),
        collection_name: bookmark.collection_name.clone().unwrap_or_default(),
        is_favorite: bookmark.is_favorite,
        is_archived: bookmark.is_archived,
        created_at,
        updated_at,
    }
}
