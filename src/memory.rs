//! In-memory [`SearchEngine`] implementation.
//!
//! Backs tests and offline/local operation. Documents live in a
//! `HashMap` behind `std::sync::RwLock`; search evaluates the same
//! `QuerySpec` the hosted engine receives — including the `filter_by`
//! clause grammar — and produces a wire-shaped JSON response, so the
//! result normalizer runs identical code on both paths and callers can
//! never tell them apart by shape.
//!
//! Matching is deliberately simple (case-insensitive substring over the
//! `query_by` fields); this is a fallback path, not a ranking engine.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;

use crate::engine::{Deleted, EngineError, ImportStatus, SearchEngine};
use crate::models::SearchDocument;
use crate::query::QuerySpec;

/// In-memory engine for tests and offline use.
#[derive(Default)]
pub struct InMemoryEngine {
    docs: RwLock<HashMap<String, SearchDocument>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents (test helper).
    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored ids, sorted (test helper).
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.docs.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get(&self, id: &str) -> Option<SearchDocument> {
        self.docs.read().unwrap().get(id).cloned()
    }
}

// ============ Filter clause evaluation ============

enum FieldValue<'a> {
    Text(&'a str),
    Tags(&'a [String]),
    Flag(bool),
    Stamp(i64),
}

fn field_value<'a>(doc: &'a SearchDocument, field: &str) -> Option<FieldValue<'a>> {
    match field {
        "id" => Some(FieldValue::Text(&doc.id)),
        "title" => Some(FieldValue::Text(&doc.title)),
        "description" => Some(FieldValue::Text(&doc.description)),
        "url" => Some(FieldValue::Text(&doc.url)),
        "content_type" => Some(FieldValue::Text(&doc.content_type)),
        "ai_summary" => Some(FieldValue::Text(&doc.ai_summary)),
        "ai_tags" => Some(FieldValue::Tags(&doc.ai_tags)),
        "user_id" => Some(FieldValue::Text(&doc.user_id)),
        "collection_id" => Some(FieldValue::Text(&doc.collection_id)),
        "collection_name" => Some(FieldValue::Text(&doc.collection_name)),
        "is_favorite" => Some(FieldValue::Flag(doc.is_favorite)),
        "is_archived" => Some(FieldValue::Flag(doc.is_archived)),
        "created_at" => Some(FieldValue::Stamp(doc.created_at)),
        "updated_at" => Some(FieldValue::Stamp(doc.updated_at)),
        _ => None,
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('`')
}

/// Split on a separator, ignoring separators inside backtick quotes.
fn split_outside_quotes<'a>(input: &'a str, sep: &str) -> Vec<&'a str> {
    let bytes = input.as_bytes();
    let sep_bytes = sep.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            in_quotes = !in_quotes;
            i += 1;
        } else if !in_quotes && bytes[i..].starts_with(sep_bytes) {
            parts.push(&input[start..i]);
            i += sep_bytes.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&input[start..]);
    parts
}

fn value_matches(value: &FieldValue<'_>, wanted: &str) -> bool {
    match value {
        FieldValue::Text(text) => *text == wanted,
        FieldValue::Tags(tags) => tags.iter().any(|t| t == wanted),
        FieldValue::Flag(flag) => wanted.parse::<bool>().map(|w| w == *flag).unwrap_or(false),
        FieldValue::Stamp(stamp) => wanted.parse::<i64>().map(|w| w == *stamp).unwrap_or(false),
    }
}

/// Evaluate one `filter_by` clause against a document. Unknown fields and
/// unparseable clauses match nothing, which keeps a bad filter from
/// silently widening a result set.
fn clause_matches(doc: &SearchDocument, clause: &str) -> bool {
    if let Some((field, rest)) = clause.split_once(":=") {
        let value = match field_value(doc, field.trim()) {
            Some(v) => v,
            None => return false,
        };
        let rest = rest.trim();
        if let Some(set) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return split_outside_quotes(set, ",")
                .into_iter()
                .any(|wanted| value_matches(&value, unquote(wanted)));
        }
        return value_matches(&value, unquote(rest));
    }

    // Range form: field:[min..max], inclusive on both ends
    if let Some((field, rest)) = clause.split_once(":[") {
        let stamp = match field_value(doc, field.trim()) {
            Some(FieldValue::Stamp(s)) => s,
            _ => return false,
        };
        let Some(range) = rest.strip_suffix(']') else {
            return false;
        };
        let Some((min, max)) = range.split_once("..") else {
            return false;
        };
        let (Ok(min), Ok(max)) = (min.trim().parse::<i64>(), max.trim().parse::<i64>()) else {
            return false;
        };
        return stamp >= min && stamp <= max;
    }

    false
}

fn filter_matches(doc: &SearchDocument, filter_by: &str) -> bool {
    split_outside_quotes(filter_by, " && ")
        .into_iter()
        .filter(|c| !c.trim().is_empty())
        .all(|clause| clause_matches(doc, clause.trim()))
}

// ============ Free-text matching ============

fn query_field_text(doc: &SearchDocument, field: &str) -> Option<String> {
    match field_value(doc, field)? {
        FieldValue::Text(text) => Some(text.to_string()),
        FieldValue::Tags(tags) => Some(tags.join(" ")),
        _ => None,
    }
}

/// Substring match over the `query_by` fields. Returns the number of
/// matching fields as the relevance score, or `None` when nothing
/// matched. The match-all token matches everything with a zero score.
fn text_match(doc: &SearchDocument, q: &str, query_by: &str) -> Option<i64> {
    if q == "*" {
        return Some(0);
    }
    let needle = q.to_lowercase();
    let matched = query_by
        .split(',')
        .filter_map(|field| query_field_text(doc, field.trim()))
        .filter(|text| text.to_lowercase().contains(&needle))
        .count();
    (matched > 0).then_some(matched as i64)
}

fn highlight_snippet(text: &str, q: &str) -> Option<String> {
    let start = text.to_lowercase().find(&q.to_lowercase())?;
    let end = start + q.len();
    Some(format!(
        "{}<mark>{}</mark>{}",
        &text[..start],
        &text[start..end],
        &text[end..]
    ))
}

#[async_trait]
impl SearchEngine for InMemoryEngine {
    async fn ensure_collection(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn upsert(&self, doc: &SearchDocument) -> Result<(), EngineError> {
        if doc.id.is_empty() {
            return Err(EngineError::Request(
                "document id must not be empty".to_string(),
            ));
        }
        self.docs
            .write()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn import(&self, docs: &[SearchDocument]) -> Result<Vec<ImportStatus>, EngineError> {
        let mut stored = self.docs.write().unwrap();
        let statuses = docs
            .iter()
            .map(|doc| {
                if doc.id.is_empty() {
                    ImportStatus {
                        id: doc.id.clone(),
                        success: false,
                        error: Some("document id must not be empty".to_string()),
                    }
                } else {
                    stored.insert(doc.id.clone(), doc.clone());
                    ImportStatus {
                        id: doc.id.clone(),
                        success: true,
                        error: None,
                    }
                }
            })
            .collect();
        Ok(statuses)
    }

    async fn delete(&self, id: &str) -> Result<Deleted, EngineError> {
        match self.docs.write().unwrap().remove(id) {
            Some(_) => Ok(Deleted::Removed),
            None => Ok(Deleted::Missing),
        }
    }

    async fn delete_by_filter(&self, filter_by: &str) -> Result<u64, EngineError> {
        let mut docs = self.docs.write().unwrap();
        let before = docs.len();
        docs.retain(|_, doc| !filter_matches(doc, filter_by));
        Ok((before - docs.len()) as u64)
    }

    async fn search(&self, spec: &QuerySpec) -> Result<serde_json::Value, EngineError> {
        let started = Instant::now();
        let docs = self.docs.read().unwrap();

        let mut matched: Vec<(&SearchDocument, i64)> = docs
            .values()
            .filter(|doc| filter_matches(doc, &spec.filter_by))
            .filter_map(|doc| text_match(doc, &spec.q, &spec.query_by).map(|score| (doc, score)))
            .collect();

        // Deterministic ordering: requested sort, then id
        let (sort_field, ascending) = spec
            .sort_by
            .split_once(':')
            .map(|(f, d)| (f, d == "asc"))
            .unwrap_or(("_text_match", false));
        matched.sort_by(|a, b| {
            let key = |(doc, score): &(&SearchDocument, i64)| match sort_field {
                "created_at" => doc.created_at,
                "updated_at" => doc.updated_at,
                _ => *score,
            };
            let ordering = key(a).cmp(&key(b));
            let ordering = if ascending { ordering } else { ordering.reverse() };
            ordering.then_with(|| a.0.id.cmp(&b.0.id))
        });

        let found = matched.len() as u64;

        // Facets count over the whole filtered set, before pagination
        let mut facet_counts = Vec::new();
        for field in spec.facet_by.split(',').map(str::trim) {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for (doc, _) in &matched {
                match field_value(doc, field) {
                    Some(FieldValue::Text(text)) if !text.is_empty() => {
                        *counts.entry(text.to_string()).or_default() += 1;
                    }
                    Some(FieldValue::Tags(tags)) => {
                        for tag in tags {
                            *counts.entry(tag.clone()).or_default() += 1;
                        }
                    }
                    Some(FieldValue::Flag(flag)) => {
                        *counts.entry(flag.to_string()).or_default() += 1;
                    }
                    _ => {}
                }
            }
            let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            counts.truncate(spec.max_facet_values as usize);
            facet_counts.push(serde_json::json!({
                "field_name": field,
                "counts": counts
                    .into_iter()
                    .map(|(value, count)| serde_json::json!({ "value": value, "count": count }))
                    .collect::<Vec<_>>(),
            }));
        }

        let page = spec.page.max(1) as usize;
        let per_page = spec.per_page as usize;
        let hits: Vec<serde_json::Value> = matched
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .map(|(doc, score)| {
                let mut highlights = Vec::new();
                if spec.q != "*" {
                    for field in spec.highlight_fields.split(',').map(str::trim) {
                        if let Some(text) = query_field_text(doc, field) {
                            if let Some(snippet) = highlight_snippet(&text, &spec.q) {
                                highlights.push(serde_json::json!({
                                    "field": field,
                                    "snippet": snippet,
                                }));
                            }
                        }
                    }
                }
                serde_json::json!({
                    "document": doc,
                    "highlights": highlights,
                    "text_match": score,
                })
            })
            .collect();

        Ok(serde_json::json!({
            "found": found,
            "search_time_ms": started.elapsed().as_millis() as u64,
            "hits": hits,
            "facet_counts": facet_counts,
        }))
    }

    async fn health(&self) -> Result<bool, EngineError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::query::{build_query, SearchOptions, SortDirection, SortField, SortSpec};
    use crate::results::normalize;

    fn doc(id: &str, user: &str, title: &str, created_at: i64) -> SearchDocument {
        SearchDocument {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            url: format!("https://example.com/{}", id),
            content_type: "article".to_string(),
            ai_summary: String::new(),
            ai_tags: vec!["rust".to_string()],
            user_id: user.to_string(),
            collection_id: String::new(),
            collection_name: String::new(),
            is_favorite: false,
            is_archived: false,
            created_at,
            updated_at: created_at,
        }
    }

    fn search_config() -> SearchConfig {
        SearchConfig {
            per_page: 20,
            max_per_page: 100,
            max_facet_values: 10,
        }
    }

    async fn seed(engine: &InMemoryEngine) {
        engine.upsert(&doc("1", "u1", "Rust async book", 100)).await.unwrap();
        engine.upsert(&doc("2", "u1", "Gardening notes", 200)).await.unwrap();
        engine.upsert(&doc("3", "u2", "Tokio async guide", 300)).await.unwrap();
    }

    #[tokio::test]
    async fn test_owner_scope_excludes_other_users() {
        let engine = InMemoryEngine::new();
        seed(&engine).await;

        // "async" appears in one u1 title and one u2 title; only the
        // owner's document comes back
        let mut options = SearchOptions::for_owner("u1");
        options.query = "async".to_string();
        let spec = build_query(&options, &search_config()).unwrap();
        let response = normalize(&engine.search(&spec).await.unwrap());

        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].document.id, "1");
    }

    #[tokio::test]
    async fn test_match_all_browse_with_sort() {
        let engine = InMemoryEngine::new();
        seed(&engine).await;

        let mut options = SearchOptions::for_owner("u1");
        options.sort = SortSpec {
            field: SortField::Created,
            direction: SortDirection::Desc,
        };
        let spec = build_query(&options, &search_config()).unwrap();
        let response = normalize(&engine.search(&spec).await.unwrap());

        assert_eq!(response.total, 2);
        assert_eq!(response.hits[0].document.id, "2");
        assert_eq!(response.hits[1].document.id, "1");
    }

    #[test]
    fn test_range_clause_is_inclusive() {
        let d = doc("1", "u1", "x", 100);
        assert!(clause_matches(&d, "created_at:[100..200]"));
        assert!(clause_matches(&d, "created_at:[0..100]"));
        assert!(!clause_matches(&d, "created_at:[101..200]"));
    }

    #[test]
    fn test_set_clause_matches_any_member() {
        let d = doc("1", "u1", "x", 100);
        assert!(clause_matches(&d, "content_type:=[article,video]"));
        assert!(!clause_matches(&d, "content_type:=[video,tool]"));
        assert!(clause_matches(&d, "ai_tags:=rust"));
        assert!(!clause_matches(&d, "ai_tags:=python"));
    }

    #[test]
    fn test_unknown_field_matches_nothing() {
        let d = doc("1", "u1", "x", 100);
        assert!(!clause_matches(&d, "nonexistent:=x"));
    }

    #[test]
    fn test_quoted_values_survive_clause_splitting() {
        let mut d = doc("1", "u1", "x", 100);
        d.collection_id = "week 1 && extras".to_string();
        assert!(filter_matches(
            &d,
            "user_id:=u1 && collection_id:=[`week 1 && extras`,`other`]"
        ));
        assert!(!filter_matches(
            &d,
            "user_id:=u2 && collection_id:=[`week 1 && extras`]"
        ));
    }

    #[tokio::test]
    async fn test_pagination_window() {
        let engine = InMemoryEngine::new();
        for i in 0..5 {
            engine
                .upsert(&doc(&format!("{}", i), "u1", "title", i as i64))
                .await
                .unwrap();
        }

        let mut options = SearchOptions::for_owner("u1");
        options.sort = SortSpec {
            field: SortField::Created,
            direction: SortDirection::Asc,
        };
        options.limit = 2;
        options.offset = 2;
        let spec = build_query(&options, &search_config()).unwrap();
        let response = normalize(&engine.search(&spec).await.unwrap());

        assert_eq!(response.total, 5);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].document.id, "2");
        assert_eq!(response.hits[1].document.id, "3");
    }

    #[tokio::test]
    async fn test_facets_and_highlights_present() {
        let engine = InMemoryEngine::new();
        seed(&engine).await;

        let mut options = SearchOptions::for_owner("u1");
        options.query = "rust".to_string();
        let spec = build_query(&options, &search_config()).unwrap();
        let response = normalize(&engine.search(&spec).await.unwrap());

        assert_eq!(response.facets["content_type"][0].value, "article");
        assert_eq!(response.facets["ai_tags"][0].value, "rust");
        assert_eq!(
            response.hits[0].highlights.get("title").map(String::as_str),
            Some("<mark>Rust</mark> async book")
        );
    }
}
