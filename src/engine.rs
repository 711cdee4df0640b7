//! Search engine abstraction.
//!
//! The [`SearchEngine`] trait is the seam between this crate and the
//! hosted search service. Every consumer — sync service, query path,
//! HTTP server, CLI — receives an engine as an explicit `Arc<dyn
//! SearchEngine>` rather than reaching for a process-wide client, which
//! keeps the hosted backend swappable for the in-memory one in tests.
//!
//! `search` returns the engine's raw JSON response; the result
//! normalizer owns the mapping to the stable application shape so both
//! engine implementations flow through identical presentation code.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SearchDocument;
use crate::query::QuerySpec;

/// Tagged engine failure. The variants matter to callers: transient
/// errors surface as "search temporarily unavailable" with a retry
/// affordance, auth errors prompt re-authentication, and config errors
/// are startup-fatal rather than caught per call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid client configuration (credentials, URL).
    #[error("search engine configuration error: {0}")]
    Config(String),
    /// The engine rejected our credentials or session.
    #[error("search engine authentication failed: {0}")]
    Auth(String),
    /// Timeout, connection failure, rate limit, or 5xx — worth retrying.
    #[error("search engine unavailable: {0}")]
    Transient(String),
    /// The engine rejected the request itself (malformed query, missing
    /// collection) — retrying the same call will not help.
    #[error("search engine rejected request: {0}")]
    Request(String),
    /// The engine answered with a body we could not interpret.
    #[error("malformed search engine response: {0}")]
    Response(String),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }
}

/// Outcome of a delete by id. Deleting an absent document is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    Removed,
    Missing,
}

/// Per-document outcome of a bulk import, in input order.
#[derive(Debug, Clone)]
pub struct ImportStatus {
    pub id: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Client-side contract with the document search engine.
///
/// All operations are async network calls (the in-memory implementation
/// returns immediately-ready futures). Upserts are full replacements
/// keyed on document id; the engine never sees a partial patch.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Create the bookmark collection if it does not exist. Idempotent.
    async fn ensure_collection(&self) -> Result<(), EngineError>;

    /// Insert or fully replace a single document by id.
    async fn upsert(&self, doc: &SearchDocument) -> Result<(), EngineError>;

    /// Upsert a batch in one round trip.
    ///
    /// The call is atomic only at the network level: the engine may
    /// apply a subset and report per-item failures, which are returned
    /// in input order rather than collapsed into one error.
    async fn import(&self, docs: &[SearchDocument]) -> Result<Vec<ImportStatus>, EngineError>;

    /// Delete a document by id. A missing id is [`Deleted::Missing`],
    /// not an error.
    async fn delete(&self, id: &str) -> Result<Deleted, EngineError>;

    /// Delete every document matching a filter expression. Returns the
    /// number of documents removed.
    async fn delete_by_filter(&self, filter_by: &str) -> Result<u64, EngineError>;

    /// Execute a search and return the engine's raw JSON response.
    async fn search(&self, spec: &QuerySpec) -> Result<serde_json::Value, EngineError>;

    /// Liveness check against the engine.
    async fn health(&self) -> Result<bool, EngineError>;
}
