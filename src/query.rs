//! Search query construction.
//!
//! Maps caller-facing [`SearchOptions`] onto the engine's wire parameters.
//! The owner-scope clause is always emitted first and can never be omitted:
//! a query without a non-empty `user_id` fails validation before any
//! network call is made.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SearchConfig;
use crate::models::ContentType;
use crate::schema::{FACET_BY_FIELDS, HIGHLIGHT_FIELDS, QUERY_BY_FIELDS};

/// Sort key for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Relevance,
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Inclusive creation-date window. An open start means "since epoch";
/// an open end means "up to now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Optional result filters. Boolean filters are tri-state: `None` means
/// "don't filter on this field" and emits no clause.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub collection_ids: Vec<String>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

/// Caller-facing query options. `offset`/`limit` are 0-based; the wire
/// protocol's 1-based page numbering is an implementation detail of
/// [`build_query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(default)]
    pub query: String,
    pub user_id: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub sort: SortSpec,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

impl SearchOptions {
    /// Minimal options: match-all browse for one owner.
    pub fn for_owner(user_id: impl Into<String>) -> Self {
        Self {
            query: String::new(),
            user_id: user_id.into(),
            filters: SearchFilters::default(),
            sort: SortSpec::default(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Fully resolved engine query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub q: String,
    pub query_by: String,
    pub filter_by: String,
    pub sort_by: String,
    pub facet_by: String,
    pub max_facet_values: u32,
    pub highlight_fields: String,
    /// 1-based on the wire.
    pub page: u32,
    pub per_page: u32,
}

/// Validation failure raised before any network call.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("owner id must not be empty")]
    MissingOwner,
    #[error("limit must be between 1 and {max}, got {got}")]
    LimitOutOfRange { got: u32, max: u32 },
    #[error("date range start {start} is after end {end}")]
    InvertedDateRange { start: i64, end: i64 },
}

/// Build the engine query for the given options.
///
/// The mapping is deterministic apart from the open-ended date range,
/// whose missing end resolves to "now". Filter clauses are AND-joined
/// with the owner-scope clause first; set filters become `IN` clauses;
/// unset booleans emit nothing. An empty free-text query becomes the
/// match-all token so filter-only browsing is a first-class mode.
pub fn build_query(options: &SearchOptions, config: &SearchConfig) -> Result<QuerySpec, QueryError> {
    let user_id = options.user_id.trim();
    if user_id.is_empty() {
        return Err(QueryError::MissingOwner);
    }
    if options.limit == 0 || options.limit > config.max_per_page {
        return Err(QueryError::LimitOutOfRange {
            got: options.limit,
            max: config.max_per_page,
        });
    }

    let mut clauses = vec![format!("user_id:={}", filter_value(user_id))];

    let filters = &options.filters;
    if !filters.content_types.is_empty() {
        let set: Vec<&str> = filters.content_types.iter().map(|c| c.as_str()).collect();
        clauses.push(format!("content_type:=[{}]", set.join(",")));
    }
    if !filters.collection_ids.is_empty() {
        let set: Vec<String> = filters
            .collection_ids
            .iter()
            .map(|id| filter_value(id))
            .collect();
        clauses.push(format!("collection_id:=[{}]", set.join(",")));
    }
    if let Some(favorite) = filters.is_favorite {
        clauses.push(format!("is_favorite:={}", favorite));
    }
    if let Some(archived) = filters.is_archived {
        clauses.push(format!("is_archived:={}", archived));
    }
    if let Some(range) = &filters.date_range {
        let start = range.start.map(|t| t.timestamp()).unwrap_or(0);
        let end = range
            .end
            .map(|t| t.timestamp())
            .unwrap_or_else(|| Utc::now().timestamp());
        if start > end {
            return Err(QueryError::InvertedDateRange { start, end });
        }
        clauses.push(format!("created_at:[{}..{}]", start, end));
    }

    let direction = options.sort.direction.as_str();
    let sort_by = match options.sort.field {
        SortField::Relevance => format!("_text_match:{}", direction),
        SortField::Created => format!("created_at:{}", direction),
        SortField::Updated => format!("updated_at:{}", direction),
    };

    let trimmed = options.query.trim();
    let q = if trimmed.is_empty() {
        "*".to_string()
    } else {
        trimmed.to_string()
    };

    Ok(QuerySpec {
        q,
        query_by: QUERY_BY_FIELDS.to_string(),
        filter_by: clauses.join(" && "),
        sort_by,
        facet_by: FACET_BY_FIELDS.to_string(),
        max_facet_values: config.max_facet_values,
        highlight_fields: HIGHLIGHT_FIELDS.to_string(),
        page: options.offset / options.limit + 1,
        per_page: options.limit,
    })
}

/// Quote a filter value so separators inside it cannot split the clause.
/// Backticks are the engine's quoting mechanism and are stripped from the
/// value itself.
pub(crate) fn filter_value(value: &str) -> String {
    let needs_quoting = value
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    if needs_quoting {
        format!("`{}`", value.replace('`', ""))
    } else {
        value.to_string()
    }
}
