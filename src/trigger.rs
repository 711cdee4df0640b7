//! Primary-store mutation → index-sync glue.
//!
//! The trigger decouples index maintenance from the mutation path: a
//! bookmark write dispatches a [`ChangeEvent`] and moves on, while a
//! background worker applies the event through the [`SyncService`].
//! Sync failures are logged and reported on the ticket — they never
//! block or roll back the primary mutation, which already succeeded or
//! failed on its own.
//!
//! Each dispatch returns a [`SyncTicket`]. A caller showing an
//! optimistic local record holds the record in a distinguishable
//! *pending* state until the ticket confirms or fails, then replaces or
//! rolls it back — pending records are never silently merged. Dropping
//! the ticket makes the dispatch fire-and-forget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

use crate::models::Bookmark;
use crate::sync::{BulkReport, SyncError, SyncService};

/// A change observed on the primary store's bookmark table.
#[derive(Debug)]
pub enum ChangeEvent {
    /// Bookmark created or updated — the index document is regenerated
    /// whole either way.
    Upserted(Bookmark),
    Deleted {
        id: String,
    },
    /// Recovery path: rebuild the owner's entire document set.
    Reindex {
        user_id: String,
        bookmarks: Vec<Bookmark>,
    },
}

struct Envelope {
    event: ChangeEvent,
    done: oneshot::Sender<Result<BulkReport, SyncError>>,
}

/// Pending confirmation for one dispatched change.
pub struct SyncTicket {
    id: Uuid,
    done: oneshot::Receiver<Result<BulkReport, SyncError>>,
}

impl SyncTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the sync worker to apply the change. Returns `None` when
    /// the worker shut down before confirming.
    pub async fn confirmed(self) -> Option<Result<BulkReport, SyncError>> {
        self.done.await.ok()
    }
}

/// Handle for dispatching change events to the background sync worker.
///
/// The worker runs until every handle is dropped.
#[derive(Clone)]
pub struct SyncTrigger {
    tx: mpsc::UnboundedSender<Envelope>,
    rebuilding: Arc<AtomicBool>,
}

impl SyncTrigger {
    /// Start the background worker around a sync service.
    pub fn spawn(service: SyncService) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let rebuilding = Arc::new(AtomicBool::new(false));
        let flag = rebuilding.clone();

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let result = match envelope.event {
                    ChangeEvent::Upserted(bookmark) => {
                        service.index_one(&bookmark).await.map(|_| BulkReport {
                            indexed: 1,
                            failures: Vec::new(),
                        })
                    }
                    ChangeEvent::Deleted { id } => {
                        service.remove_one(&id).await.map(|_| BulkReport::default())
                    }
                    ChangeEvent::Reindex { user_id, bookmarks } => {
                        flag.store(true, Ordering::SeqCst);
                        let result = service.reindex_for_owner(&user_id, &bookmarks).await;
                        flag.store(false, Ordering::SeqCst);
                        result
                    }
                };
                if let Err(ref e) = result {
                    warn!(error = %e, "index sync failed; primary mutation unaffected");
                }
                // Receiver may be gone — fire-and-forget dispatch
                let _ = envelope.done.send(result);
            }
        });

        Self { tx, rebuilding }
    }

    /// Enqueue a change event. Never blocks and never fails the caller;
    /// if the worker is gone the event is dropped with a warning and the
    /// ticket resolves to `None`.
    pub fn dispatch(&self, event: ChangeEvent) -> SyncTicket {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .tx
            .send(Envelope {
                event,
                done: done_tx,
            })
            .is_err()
        {
            warn!("sync worker is gone; change event dropped");
        }
        SyncTicket {
            id: Uuid::new_v4(),
            done: done_rx,
        }
    }

    /// Whether an owner reindex is currently rebuilding the index. The
    /// query path stays available during a rebuild; callers that prefer
    /// to suppress visibly-partial results may consult this flag.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Deleted, EngineError, ImportStatus, SearchEngine};
    use crate::memory::InMemoryEngine;
    use crate::models::{ContentType, SearchDocument};
    use crate::query::QuerySpec;
    use async_trait::async_trait;
    use chrono::Utc;

    fn bookmark(id: &str, user: &str) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            user_id: user.to_string(),
            url: format!("https://example.com/{}", id),
            title: format!("bookmark {}", id),
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
        }
    }

    #[tokio::test]
    async fn test_dispatch_upsert_confirms_and_indexes() {
        let engine = Arc::new(InMemoryEngine::new());
        let trigger = SyncTrigger::spawn(SyncService::new(engine.clone()));

        let ticket = trigger.dispatch(ChangeEvent::Upserted(bookmark("1", "u1")));
        let report = ticket.confirmed().await.unwrap().unwrap();
        assert_eq!(report.indexed, 1);
        assert!(engine.get("1").is_some());
    }

    #[tokio::test]
    async fn test_dispatch_delete_is_idempotent() {
        let engine = Arc::new(InMemoryEngine::new());
        let trigger = SyncTrigger::spawn(SyncService::new(engine.clone()));

        trigger
            .dispatch(ChangeEvent::Upserted(bookmark("1", "u1")))
            .confirmed()
            .await
            .unwrap()
            .unwrap();
        trigger
            .dispatch(ChangeEvent::Deleted {
                id: "1".to_string(),
            })
            .confirmed()
            .await
            .unwrap()
            .unwrap();
        // Deleting again still confirms
        trigger
            .dispatch(ChangeEvent::Deleted {
                id: "1".to_string(),
            })
            .confirmed()
            .await
            .unwrap()
            .unwrap();
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_reindex_reports_per_item_failures() {
        let engine = Arc::new(InMemoryEngine::new());
        let trigger = SyncTrigger::spawn(SyncService::new(engine.clone()));

        let ticket = trigger.dispatch(ChangeEvent::Reindex {
            user_id: "u1".to_string(),
            bookmarks: vec![bookmark("1", "u1"), bookmark("", "u1")],
        });
        let report = ticket.confirmed().await.unwrap().unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(!trigger.is_rebuilding());
    }

    /// Engine that refuses writes — models an unreachable hosted engine.
    struct DownEngine;

    #[async_trait]
    impl SearchEngine for DownEngine {
        async fn ensure_collection(&self) -> Result<(), EngineError> {
            Err(EngineError::Transient("down".to_string()))
        }
        async fn upsert(&self, _doc: &SearchDocument) -> Result<(), EngineError> {
            Err(EngineError::Transient("down".to_string()))
        }
        async fn import(&self, _docs: &[SearchDocument]) -> Result<Vec<ImportStatus>, EngineError> {
            Err(EngineError::Transient("down".to_string()))
        }
        async fn delete(&self, _id: &str) -> Result<Deleted, EngineError> {
            Err(EngineError::Transient("down".to_string()))
        }
        async fn delete_by_filter(&self, _filter_by: &str) -> Result<u64, EngineError> {
            Err(EngineError::Transient("down".to_string()))
        }
        async fn search(&self, _spec: &QuerySpec) -> Result<serde_json::Value, EngineError> {
            Err(EngineError::Transient("down".to_string()))
        }
        async fn health(&self) -> Result<bool, EngineError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_worker_survives_sync_failures() {
        let trigger = SyncTrigger::spawn(SyncService::new(Arc::new(DownEngine)));

        let ticket = trigger.dispatch(ChangeEvent::Upserted(bookmark("1", "u1")));
        assert!(ticket.confirmed().await.unwrap().is_err());

        // The worker keeps draining events after a failure
        let ticket = trigger.dispatch(ChangeEvent::Deleted {
            id: "1".to_string(),
        });
        assert!(ticket.confirmed().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_dropped_ticket_is_fire_and_forget() {
        let engine = Arc::new(InMemoryEngine::new());
        let trigger = SyncTrigger::spawn(SyncService::new(engine.clone()));

        drop(trigger.dispatch(ChangeEvent::Upserted(bookmark("1", "u1"))));
        // The event still lands even though nobody awaited it
        let settled = trigger.dispatch(ChangeEvent::Upserted(bookmark("2", "u1")));
        settled.confirmed().await.unwrap().unwrap();
        assert_eq!(engine.ids(), vec!["1", "2"]);
    }
}
