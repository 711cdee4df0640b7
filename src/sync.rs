//! Index synchronization service.
//!
//! Keeps the search engine's document set consistent with the primary
//! store. Every operation transforms the canonical bookmark through
//! [`to_search_document`] and reports failure as a tagged [`SyncError`]
//! instead of propagating raw transport errors — an index-sync failure
//! is never fatal to the primary-store mutation that triggered it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::document::to_search_document;
use crate::engine::{EngineError, SearchEngine};
use crate::models::Bookmark;
use crate::query::filter_value;

/// Tagged sync failure carrying the failed operation's context.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("indexing bookmark {id} failed: {source}")]
    Index {
        id: String,
        #[source]
        source: EngineError,
    },
    #[error("removing bookmark {id} from index failed: {source}")]
    Remove {
        id: String,
        #[source]
        source: EngineError,
    },
    #[error("bulk import of {count} bookmarks failed: {source}")]
    Bulk {
        count: usize,
        #[source]
        source: EngineError,
    },
    #[error("reindex for owner {user_id} failed during {stage}: {source}")]
    Reindex {
        user_id: String,
        stage: &'static str,
        #[source]
        source: EngineError,
    },
}

/// One document the engine rejected during a bulk operation.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub id: String,
    pub message: String,
}

/// Outcome of a bulk operation. `failures` is never silently dropped:
/// the engine may apply a batch partially, and callers decide what to do
/// with the remainder.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    pub indexed: usize,
    pub failures: Vec<ItemFailure>,
}

/// Sync operations against an injected engine.
#[derive(Clone)]
pub struct SyncService {
    engine: Arc<dyn SearchEngine>,
}

impl SyncService {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self { engine }
    }

    /// Transform and upsert a single bookmark. Upsert semantics: creates
    /// if absent, fully replaces if present — never a partial patch.
    pub async fn index_one(&self, bookmark: &Bookmark) -> Result<(), SyncError> {
        let doc = to_search_document(bookmark);
        debug!(id = %doc.id, "indexing bookmark");
        self.engine.upsert(&doc).await.map_err(|source| SyncError::Index {
            id: bookmark.id.clone(),
            source,
        })
    }

    /// Delete a bookmark's document by id. Deleting an id the engine no
    /// longer has is success, so retries and double-deletes are safe.
    pub async fn remove_one(&self, bookmark_id: &str) -> Result<(), SyncError> {
        debug!(id = %bookmark_id, "removing bookmark from index");
        self.engine
            .delete(bookmark_id)
            .await
            .map(|_| ())
            .map_err(|source| SyncError::Remove {
                id: bookmark_id.to_string(),
                source,
            })
    }

    /// Transform and upsert a batch in one engine round trip.
    ///
    /// The batch is atomic only at the network level; per-item failures
    /// reported by the engine come back in [`BulkReport::failures`].
    pub async fn index_bulk(&self, bookmarks: &[Bookmark]) -> Result<BulkReport, SyncError> {
        let docs: Vec<_> = bookmarks.iter().map(to_search_document).collect();
        let statuses = self
            .engine
            .import(&docs)
            .await
            .map_err(|source| SyncError::Bulk {
                count: bookmarks.len(),
                source,
            })?;

        let mut report = BulkReport::default();
        for status in statuses {
            if status.success {
                report.indexed += 1;
            } else {
                let message = status.error.unwrap_or_else(|| "import rejected".to_string());
                warn!(id = %status.id, %message, "bulk import item failed");
                report.failures.push(ItemFailure {
                    id: status.id,
                    message,
                });
            }
        }
        debug!(
            indexed = report.indexed,
            failed = report.failures.len(),
            "bulk import finished"
        );
        Ok(report)
    }

    /// Rebuild the owner's entire document set: delete everything the
    /// engine holds for the owner, then bulk-import the given bookmarks,
    /// strictly in that order. Re-running with the same input converges
    /// to the same engine state.
    pub async fn reindex_for_owner(
        &self,
        user_id: &str,
        bookmarks: &[Bookmark],
    ) -> Result<BulkReport, SyncError> {
        let filter = format!("user_id:={}", filter_value(user_id));
        let removed = self
            .engine
            .delete_by_filter(&filter)
            .await
            .map_err(|source| SyncError::Reindex {
                user_id: user_id.to_string(),
                stage: "delete",
                source,
            })?;
        debug!(%user_id, removed, "cleared owner document set for reindex");

        // Records for other owners never enter this owner's rebuild
        let own: Vec<Bookmark> = bookmarks
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        if own.len() != bookmarks.len() {
            warn!(
                %user_id,
                skipped = bookmarks.len() - own.len(),
                "reindex input contained records for other owners"
            );
        }

        self.index_bulk(&own).await.map_err(|e| match e {
            SyncError::Bulk { source, .. } => SyncError::Reindex {
                user_id: user_id.to_string(),
                stage: "import",
                source,
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEngine;
    use crate::models::ContentType;
    use chrono::{TimeZone, Utc};

    fn bookmark(id: &str, user: &str, title: &str) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            user_id: user.to_string(),
            url: format!("https://example.com/{}", id),
            title: title.to_string(),
            description: None,
            content_type: ContentType::Article,
            ai_summary: None,
            ai_tags: None,
            collection_id: None,
            collection_name: None,
            is_favorite: false,
            is_archived: false,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn service() -> (SyncService, Arc<InMemoryEngine>) {
        let engine = Arc::new(InMemoryEngine::new());
        (SyncService::new(engine.clone()), engine)
    }

    #[tokio::test]
    async fn test_index_one_upserts_full_document() {
        let (sync, engine) = service();
        let mut b = bookmark("1", "u1", "First title");
        sync.index_one(&b).await.unwrap();
        assert_eq!(engine.get("1").unwrap().title, "First title");

        // Re-indexing replaces the whole document, not a patch
        b.title = "Second title".to_string();
        b.description = Some("now described".to_string());
        sync.index_one(&b).await.unwrap();
        let doc = engine.get("1").unwrap();
        assert_eq!(doc.title, "Second title");
        assert_eq!(doc.description, "now described");
        assert_eq!(engine.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_one_is_idempotent() {
        let (sync, engine) = service();
        sync.index_one(&bookmark("1", "u1", "t")).await.unwrap();

        sync.remove_one("1").await.unwrap();
        assert!(engine.is_empty());
        // Second delete targets an absent document and still succeeds
        sync.remove_one("1").await.unwrap();
    }

    #[tokio::test]
    async fn test_index_bulk_surfaces_partial_failures() {
        let (sync, engine) = service();
        let bookmarks = vec![
            bookmark("1", "u1", "a"),
            bookmark("", "u1", "bad id"),
            bookmark("3", "u1", "c"),
        ];

        let report = sync.index_bulk(&bookmarks).await.unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("id"));
        assert_eq!(engine.ids(), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_reindex_replaces_owner_set_and_converges() {
        let (sync, engine) = service();
        // Stale owner documents plus another tenant's document
        sync.index_one(&bookmark("stale-1", "u1", "old")).await.unwrap();
        sync.index_one(&bookmark("stale-2", "u1", "old")).await.unwrap();
        sync.index_one(&bookmark("other", "u2", "keep")).await.unwrap();

        let fresh = vec![bookmark("1", "u1", "new"), bookmark("2", "u1", "new")];
        let report = sync.reindex_for_owner("u1", &fresh).await.unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(engine.ids(), vec!["1", "2", "other"]);

        // Re-running with the same input leaves the engine state unchanged
        sync.reindex_for_owner("u1", &fresh).await.unwrap();
        assert_eq!(engine.ids(), vec!["1", "2", "other"]);
    }

    #[tokio::test]
    async fn test_reindex_skips_foreign_records() {
        let (sync, engine) = service();
        let mixed = vec![bookmark("1", "u1", "mine"), bookmark("2", "u2", "theirs")];
        let report = sync.reindex_for_owner("u1", &mixed).await.unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(engine.ids(), vec!["1"]);
    }
}
