//! Core data models for the MindMark search layer.
//!
//! These types represent the canonical bookmark record, the flattened
//! search document derived from it, and the stable result shapes handed
//! to consumers regardless of which engine path produced them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookmark content classification. Facetable in the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Webpage,
    Article,
    Video,
    Document,
    Tool,
    Reference,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Webpage => "webpage",
            ContentType::Article => "article",
            ContentType::Video => "video",
            ContentType::Document => "document",
            ContentType::Tool => "tool",
            ContentType::Reference => "reference",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webpage" => Ok(ContentType::Webpage),
            "article" => Ok(ContentType::Article),
            "video" => Ok(ContentType::Video),
            "document" => Ok(ContentType::Document),
            "tool" => Ok(ContentType::Tool),
            "reference" => Ok(ContentType::Reference),
            other => Err(format!(
                "unknown content type: '{}'. Use webpage, article, video, document, tool, or reference.",
                other
            )),
        }
    }
}

/// Canonical bookmark record as produced by the primary store.
///
/// The primary store owns these; this crate only derives search documents
/// from them and never writes them back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content_type: ContentType,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub ai_tags: Option<Vec<String>>,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    /// Absent when the record has never been edited after creation.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Flattened projection of a [`Bookmark`] sent to the search engine.
///
/// Shape matches the engine collection schema exactly: no nulls (optional
/// text is the empty string, optional tag lists the empty array) and
/// timestamps as integer epoch seconds so the engine can sort on them.
/// Always regenerated whole from the source bookmark, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub content_type: String,
    pub ai_summary: String,
    pub ai_tags: Vec<String>,
    pub user_id: String,
    pub collection_id: String,
    pub collection_name: String,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A single normalized search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: SearchDocument,
    /// Highlight snippet per field, present only when the engine returned one.
    pub highlights: BTreeMap<String, String>,
    /// Engine relevance score; absent when sorting bypassed text ranking.
    pub score: Option<i64>,
}

/// Value/count pair for one facet value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// Normalized search response — the one shape every query path produces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Facet counts keyed by field name (content_type, collection_name, ai_tags).
    pub facets: BTreeMap<String, Vec<FacetCount>>,
    pub total: u64,
    pub search_time_ms: u64,
}
