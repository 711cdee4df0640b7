//! Debounced, cached, cancellable search sessions.
//!
//! A [`SearchSession`] serves one consuming surface (a search box). Each
//! `submit` arms a trailing-edge debounce timer; the request only goes
//! out once input pauses. A newer `submit` aborts whatever the session
//! is doing, and a generation counter additionally discards any stale
//! response that still manages to arrive — the state visible to the
//! subscriber always corresponds to the most recent query.
//!
//! Session state is published through a `tokio::sync::watch` channel as
//! a real discriminated union, so consumers can never observe an
//! inconsistent partial state (loading with stale results, error with
//! results, and so on).
//!
//! The response cache is bounded FIFO — oldest-inserted evicted first —
//! and keyed on the composite of normalized query text, filters, sort,
//! and pagination window, so a hit is always safe to serve.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{SearchConfig, SessionConfig};
use crate::engine::{EngineError, SearchEngine};
use crate::models::SearchResponse;
use crate::query::{build_query, SearchOptions};
use crate::results::normalize;

/// How a search attempt failed, for UI affordance selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Engine unreachable or overloaded — show "temporarily unavailable"
    /// with a retry action.
    Unavailable,
    /// Credentials rejected — prompt re-authentication, not a retry.
    Unauthorized,
    /// The request itself was invalid; retrying unchanged will not help.
    Rejected,
}

fn failure_kind(error: &EngineError) -> FailureKind {
    match error {
        EngineError::Transient(_) => FailureKind::Unavailable,
        EngineError::Auth(_) => FailureKind::Unauthorized,
        _ => FailureKind::Rejected,
    }
}

/// Observable session state. `Settled` with zero hits is a valid result,
/// distinct from `Failed`.
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    Debouncing,
    InFlight,
    Settled(SearchResponse),
    Failed { kind: FailureKind, message: String },
}

// ============ Bounded FIFO response cache ============

struct QueryCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, SearchResponse>,
}

impl QueryCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<SearchResponse> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, response: SearchResponse) {
        // Re-inserting keeps the original queue position: eviction order
        // is strictly oldest-inserted-first, not least-recently-used.
        if self.entries.insert(key.clone(), response).is_none() {
            self.order.push_back(key);
            if self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
    }
}

fn cache_key(options: &SearchOptions) -> String {
    let query = options.query.trim().to_lowercase();
    let scope = serde_json::json!({
        "user_id": options.user_id,
        "filters": options.filters,
        "sort": options.sort,
        "limit": options.limit,
        "offset": options.offset,
    });
    format!("{}\u{1}{}", query, scope)
}

// ============ Session ============

struct SessionInner {
    engine: Arc<dyn SearchEngine>,
    session: SessionConfig,
    search: SearchConfig,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    cache: Mutex<QueryCache>,
}

impl SessionInner {
    fn superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Publish a state transition unless a newer submission took over.
    fn apply(&self, generation: u64, state: SessionState) {
        if !self.superseded(generation) {
            self.state.send_replace(state);
        }
    }

    async fn run(self: Arc<Self>, generation: u64, options: SearchOptions) {
        tokio::time::sleep(Duration::from_millis(self.session.debounce_ms)).await;
        if self.superseded(generation) {
            return;
        }

        let key = cache_key(&options);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            self.apply(generation, SessionState::Settled(cached));
            return;
        }

        let spec = match build_query(&options, &self.search) {
            Ok(spec) => spec,
            Err(e) => {
                self.apply(
                    generation,
                    SessionState::Failed {
                        kind: FailureKind::Rejected,
                        message: e.to_string(),
                    },
                );
                return;
            }
        };

        self.apply(generation, SessionState::InFlight);
        match self.engine.search(&spec).await {
            Ok(raw) => {
                // A response for a superseded query is discarded, never shown
                if self.superseded(generation) {
                    return;
                }
                let response = normalize(&raw);
                self.cache.lock().unwrap().insert(key, response.clone());
                self.apply(generation, SessionState::Settled(response));
            }
            Err(e) => {
                self.apply(
                    generation,
                    SessionState::Failed {
                        kind: failure_kind(&e),
                        message: e.to_string(),
                    },
                );
            }
        }
    }
}

/// One search box worth of debounce, cache, and cancellation state.
/// Local to its consumer — nothing here is process-wide.
pub struct SearchSession {
    inner: Arc<SessionInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SearchSession {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        session: SessionConfig,
        search: SearchConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let cache = Mutex::new(QueryCache::new(session.cache_capacity));
        Self {
            inner: Arc::new(SessionInner {
                engine,
                session,
                search,
                state,
                generation: AtomicU64::new(0),
                cache,
            }),
            task: Mutex::new(None),
        }
    }

    /// Watch the session state. The receiver sees every transition made
    /// on behalf of the latest submission.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Submit new query options, resetting the debounce timer.
    ///
    /// Supersedes any earlier submission: an armed timer is dropped and
    /// an in-flight request aborted before the new timer is armed. An
    /// empty query is still a submission — match-all browse with filters
    /// is a first-class mode; use [`clear`](Self::clear) to leave search.
    pub fn submit(&self, options: SearchOptions) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.task.lock().unwrap().take() {
            previous.abort();
        }
        self.inner.state.send_replace(SessionState::Debouncing);

        let inner = self.inner.clone();
        let handle = tokio::spawn(inner.run(generation, options));
        *self.task.lock().unwrap() = Some(handle);
    }

    /// Leave search: drop results immediately without waiting for any
    /// in-flight response.
    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.task.lock().unwrap().take() {
            previous.abort();
        }
        self.inner.state.send_replace(SessionState::Idle);
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        // Consumer went away — nothing left to deliver to
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}
