//! Fixed engine collection schema.
//!
//! The document schema is owned by this crate and must match
//! [`SearchDocument`](crate::models::SearchDocument) field for field.
//! Collection initialization is idempotent — creating an already-existing
//! collection is not an error.

/// Fields searched by free-text queries, in ranking-weight order.
pub const QUERY_BY_FIELDS: &str = "title,description,url,ai_summary,ai_tags";

/// Fields faceted on every query so the UI can render filter counts
/// without a second round trip.
pub const FACET_BY_FIELDS: &str = "content_type,collection_name,ai_tags";

/// Fields eligible for highlight snippets.
pub const HIGHLIGHT_FIELDS: &str = "title,description,ai_summary";

/// Numeric field used when no explicit sort is requested.
pub const DEFAULT_SORT_FIELD: &str = "created_at";

/// Engine collection schema for bookmark documents.
///
/// Optional bookmark fields appear here as required strings because the
/// transformer substitutes empty-string/empty-array defaults — the engine
/// never sees a null.
pub fn collection_schema(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "fields": [
            { "name": "id", "type": "string" },
            { "name": "title", "type": "string" },
            { "name": "description", "type": "string" },
            { "name": "url", "type": "string" },
            { "name": "content_type", "type": "string", "facet": true },
            { "name": "ai_summary", "type": "string" },
            { "name": "ai_tags", "type": "string[]", "facet": true },
            { "name": "user_id", "type": "string" },
            { "name": "collection_id", "type": "string", "facet": true },
            { "name": "collection_name", "type": "string", "facet": true },
            { "name": "is_favorite", "type": "bool", "facet": true },
            { "name": "is_archived", "type": "bool", "facet": true },
            { "name": "created_at", "type": "int64" },
            { "name": "updated_at", "type": "int64" }
        ],
        "default_sorting_field": DEFAULT_SORT_FIELD
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::to_search_document;
    use crate::models::{Bookmark, ContentType};
    use chrono::Utc;

    #[test]
    fn test_schema_covers_every_document_field() {
        let bookmark = Bookmark {
            id: "1".to_string(),
            user_id: "u1".to_string(),
            url: "https://example.com".to_string(),
            title: "t".to_string(),
            description: None,
            content_type: ContentType::Webpage,
            ai_summary: None,
            ai_tags: None,
            collection_id: None,
            collection_name: None,
            is_favorite: false,
            is_archived: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        let doc = serde_json::to_value(to_search_document(&bookmark)).unwrap();

        let schema = collection_schema("bookmarks");
        let schema_fields: Vec<&str> = schema["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();

        for field in doc.as_object().unwrap().keys() {
            assert!(
                schema_fields.contains(&field.as_str()),
                "document field {} missing from schema",
                field
            );
        }
        assert_eq!(doc.as_object().unwrap().len(), schema_fields.len());
    }
}
