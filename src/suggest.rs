//! Owner-scoped search suggestions.
//!
//! Backs the search box's typeahead: a small owner-scoped query over the
//! regular index, with titles and tags filtered down to prefix matches.
//! No separate suggestion index exists — this is a lightweight read of
//! the same document set.

use anyhow::Result;

use crate::config::SearchConfig;
use crate::engine::SearchEngine;
use crate::query::{build_query, SearchOptions};
use crate::results::normalize;

/// Below this many characters of input no suggestion query is issued.
pub const MIN_PREFIX_CHARS: usize = 2;

/// Candidate documents fetched per suggestion query.
const CANDIDATE_LIMIT: u32 = 10;

/// Suggest completions for a partial query.
///
/// Returns an empty list for input shorter than [`MIN_PREFIX_CHARS`].
/// Suggestions are de-duplicated case-insensitively and capped at
/// `limit`, in result-rank order.
pub async fn suggestions(
    engine: &dyn SearchEngine,
    search: &SearchConfig,
    user_id: &str,
    partial: &str,
    limit: usize,
) -> Result<Vec<String>> {
    let partial = partial.trim();
    if partial.chars().count() < MIN_PREFIX_CHARS {
        return Ok(Vec::new());
    }

    let mut options = SearchOptions::for_owner(user_id);
    options.query = partial.to_string();
    options.limit = CANDIDATE_LIMIT.min(search.max_per_page);
    let spec = build_query(&options, search)?;
    let response = normalize(&engine.search(&spec).await?);

    let needle = partial.to_lowercase();
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for hit in &response.hits {
        let candidates = std::iter::once(hit.document.title.as_str())
            .chain(hit.document.ai_tags.iter().map(String::as_str));
        for candidate in candidates {
            let folded = candidate.to_lowercase();
            if folded.starts_with(&needle) && seen.insert(folded) {
                out.push(candidate.to_string());
                if out.len() == limit {
                    return Ok(out);
                }
            }
        }
    }
    Ok(out)
}
