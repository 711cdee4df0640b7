//! Engine response normalization.
//!
//! Maps the engine's hit/facet/highlight JSON into the stable
//! [`SearchResponse`] shape. Every read is defensive: absent metadata
//! normalizes to zero, absent highlights and facets to empty, and a hit
//! without a document object is dropped rather than turned into an
//! error. Consumers never see the engine's wire format.

use std::collections::BTreeMap;

use crate::models::{FacetCount, SearchDocument, SearchHit, SearchResponse};

/// Normalize a raw engine response into the application result shape.
pub fn normalize(response: &serde_json::Value) -> SearchResponse {
    let hits = response
        .get("hits")
        .and_then(|h| h.as_array())
        .map(|entries| entries.iter().filter_map(normalize_hit).collect())
        .unwrap_or_default();

    let mut facets = BTreeMap::new();
    if let Some(facet_counts) = response.get("facet_counts").and_then(|f| f.as_array()) {
        for facet in facet_counts {
            let field = match facet.get("field_name").and_then(|f| f.as_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let counts: Vec<FacetCount> = facet
                .get("counts")
                .and_then(|c| c.as_array())
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|entry| {
                            let value = entry.get("value")?.as_str()?.to_string();
                            let count = entry.get("count").and_then(|c| c.as_u64()).unwrap_or(0);
                            Some(FacetCount { value, count })
                        })
                        .collect()
                })
                .unwrap_or_default();
            facets.insert(field, counts);
        }
    }

    SearchResponse {
        hits,
        facets,
        total: response.get("found").and_then(|f| f.as_u64()).unwrap_or(0),
        search_time_ms: response
            .get("search_time_ms")
            .and_then(|t| t.as_u64())
            .unwrap_or(0),
    }
}

fn normalize_hit(hit: &serde_json::Value) -> Option<SearchHit> {
    let doc = hit.get("document")?;
    doc.as_object()?;

    let mut highlights = BTreeMap::new();
    if let Some(spans) = hit.get("highlights").and_then(|h| h.as_array()) {
        for span in spans {
            if let (Some(field), Some(snippet)) = (
                span.get("field").and_then(|f| f.as_str()),
                span.get("snippet").and_then(|s| s.as_str()),
            ) {
                highlights.insert(field.to_string(), snippet.to_string());
            }
        }
    }

    Some(SearchHit {
        document: document_from_value(doc),
        highlights,
        score: hit.get("text_match").and_then(|s| s.as_i64()),
    })
}

/// Rebuild a [`SearchDocument`] field by field with explicit defaults, so
/// a document the engine returns with fields missing (older schema,
/// partial projection) still normalizes instead of failing to parse.
fn document_from_value(doc: &serde_json::Value) -> SearchDocument {
    let text = |field: &str| {
        doc.get(field)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let flag = |field: &str| doc.get(field).and_then(|v| v.as_bool()).unwrap_or(false);
    let stamp = |field: &str| doc.get(field).and_then(|v| v.as_i64()).unwrap_or(0);

    SearchDocument {
        id: text("id"),
        title: text("title"),
        description: text("description"),
        url: text("url"),
        content_type: text("content_type"),
        ai_summary: text("ai_summary"),
        ai_tags: doc
            .get("ai_tags")
            .and_then(|v| v.as_array())
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        user_id: text("user_id"),
        collection_id: text("collection_id"),
        collection_name: text("collection_name"),
        is_favorite: flag("is_favorite"),
        is_archived: flag("is_archived"),
        created_at: stamp("created_at"),
        updated_at: stamp("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_response_normalizes() {
        let response = json!({
            "found": 2,
            "search_time_ms": 7,
            "hits": [
                {
                    "document": {
                        "id": "1",
                        "title": "Rust Book",
                        "description": "The book",
                        "url": "https://doc.rust-lang.org/book",
                        "content_type": "reference",
                        "ai_summary": "",
                        "ai_tags": ["rust", "learning"],
                        "user_id": "u1",
                        "collection_id": "c1",
                        "collection_name": "Rust",
                        "is_favorite": true,
                        "is_archived": false,
                        "created_at": 1700000000,
                        "updated_at": 1700000001
                    },
                    "highlights": [
                        { "field": "title", "snippet": "<mark>Rust</mark> Book" }
                    ],
                    "text_match": 578730
                },
                {
                    "document": { "id": "2", "title": "Other" }
                }
            ],
            "facet_counts": [
                {
                    "field_name": "content_type",
                    "counts": [
                        { "value": "reference", "count": 1 },
                        { "value": "article", "count": 1 }
                    ]
                }
            ]
        });

        let normalized = normalize(&response);
        assert_eq!(normalized.total, 2);
        assert_eq!(normalized.search_time_ms, 7);
        assert_eq!(normalized.hits.len(), 2);

        let first = &normalized.hits[0];
        assert_eq!(first.document.id, "1");
        assert_eq!(first.document.ai_tags, vec!["rust", "learning"]);
        assert_eq!(
            first.highlights.get("title").map(String::as_str),
            Some("<mark>Rust</mark> Book")
        );
        assert_eq!(first.score, Some(578730));

        // Second hit has a sparse document and no highlights
        let second = &normalized.hits[1];
        assert_eq!(second.document.id, "2");
        assert_eq!(second.document.description, "");
        assert!(second.highlights.is_empty());
        assert_eq!(second.score, None);

        let content_types = &normalized.facets["content_type"];
        assert_eq!(content_types[0].value, "reference");
        assert_eq!(content_types[0].count, 1);
    }

    #[test]
    fn test_empty_response_normalizes_to_defaults() {
        let normalized = normalize(&json!({}));
        assert!(normalized.hits.is_empty());
        assert!(normalized.facets.is_empty());
        assert_eq!(normalized.total, 0);
        assert_eq!(normalized.search_time_ms, 0);
    }

    #[test]
    fn test_hit_without_document_is_dropped() {
        let response = json!({
            "found": 1,
            "hits": [ { "text_match": 1 } ]
        });
        let normalized = normalize(&response);
        assert!(normalized.hits.is_empty());
        assert_eq!(normalized.total, 1);
    }

    #[test]
    fn test_malformed_facet_entries_skipped() {
        let response = json!({
            "facet_counts": [
                { "counts": [ { "value": "x", "count": 1 } ] },
                { "field_name": "ai_tags", "counts": [ { "count": 3 }, { "value": "rust", "count": 2 } ] }
            ]
        });
        let normalized = normalize(&response);
        assert_eq!(normalized.facets.len(), 1);
        let tags = &normalized.facets["ai_tags"];
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].value, "rust");
    }
}
