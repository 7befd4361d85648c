use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use super::state::{classify, ErrorMessage, Intent, ListUiState, LoadPhase, MessageKey};
use crate::catalog::RemoteSource;
use crate::store::{ListKey, Store};

/// First page token of every catalog list.
const FIRST_PAGE: i64 = 1;

/// Phase facts captured before a fetch, used to restore state on failure.
#[derive(Debug, Clone, Copy)]
struct ListPhaseSnapshot {
    cached_count: i64,
    end_reached: bool,
}

/// Which operation last failed, so `Retry` re-runs the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailedOp {
    Refresh,
    Append,
}

/// In-memory per-list session bookkeeping.
///
/// `cached_count` mirrors the store so UI snapshots stay pure (no I/O);
/// it is re-read after every page-load transaction.
struct SessionEntry {
    list: ListKey,
    phase: LoadPhase,
    cached_count: i64,
    is_retry: bool,
    error: Option<ErrorMessage>,
    last_failed: Option<FailedOp>,
}

impl SessionEntry {
    fn new(list: ListKey) -> Self {
        Self {
            list,
            phase: LoadPhase::Empty,
            cached_count: 0,
            is_retry: false,
            error: None,
            last_failed: None,
        }
    }

    fn snapshot(&self) -> ListUiState {
        ListUiState {
            list: self.list.clone(),
            phase: self.phase,
            cached_count: self.cached_count,
            is_retry: self.is_retry,
            error: self.error,
        }
    }
}

// ============================================================================
// Pager
// ============================================================================

/// Drives the refresh/append protocol for every list session.
///
/// Reads and writes for a given list are serialized behind that list's own
/// async mutex; unrelated lists proceed fully concurrently. A remote or store
/// failure is caught here and surfaced as a message key in [`ListUiState`] —
/// nothing throws through to the rendering layer, and the cache is never
/// partially mutated (page-load transactions roll back wholesale, including
/// on cancellation).
pub struct Pager<R: RemoteSource> {
    store: Store,
    remote: Arc<R>,
    // Per-list critical sections. The std mutexes guard only the maps and
    // are never held across an await.
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    sessions: StdMutex<HashMap<String, SessionEntry>>,
}

impl<R: RemoteSource> Pager<R> {
    pub fn new(store: Store, remote: R) -> Self {
        Self {
            store,
            remote: Arc::new(remote),
            locks: StdMutex::new(HashMap::new()),
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    /// Read access to the underlying store (cached-rows views for rendering).
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn list_lock(&self, slug: &str) -> Arc<Mutex<()>> {
        // Recover from poisoning: the registry holds plain data and a panicked
        // holder cannot leave it inconsistent.
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .entry(slug.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn with_entry<T>(&self, list: &ListKey, f: impl FnOnce(&mut SessionEntry) -> T) -> T {
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        let entry = sessions
            .entry(list.slug())
            .or_insert_with(|| SessionEntry::new(list.clone()));
        f(entry)
    }

    /// Pure snapshot of the current per-list presentation state. No I/O.
    pub fn ui_state(&self, list: &ListKey) -> ListUiState {
        self.with_entry(list, |e| e.snapshot())
    }

    /// Adopt whatever the durable cache already holds for a list, so a new
    /// screen session starts from cached content instead of `Empty`.
    ///
    /// End-of-list is recovered from the boundary item's cursor record; an
    /// absent record on a non-empty cache means "adjacent page unknown",
    /// which the next `load_more` resolves.
    pub async fn attach(&self, list: &ListKey) -> Result<ListUiState> {
        let count = self.store.cached_count(list).await?;
        let end_reached = match self.store.last_cached(list).await? {
            Some(boundary) => self
                .store
                .remote_key(list, boundary.id)
                .await?
                .is_some_and(|k| k.next_page.is_none()),
            None => false,
        };

        Ok(self.with_entry(list, |e| {
            e.cached_count = count;
            if count > 0 {
                e.phase = LoadPhase::Loaded { end_reached };
            }
            e.snapshot()
        }))
    }

    // ========================================================================
    // Refresh / Append Protocol
    // ========================================================================

    /// Forced full refresh: atomic clear+insert of page 1.
    ///
    /// On failure the existing cache and cursors are untouched and the error
    /// is surfaced as a retryable message key; previously cached rows remain
    /// readable.
    pub async fn refresh(&self, list: &ListKey) -> Result<ListUiState> {
        let lock = self.list_lock(&list.slug());
        let _guard = lock.lock().await;
        self.refresh_locked(list).await
    }

    /// Scroll-driven append: fetch the page after the boundary item.
    ///
    /// An exhausted list (no cursor, or `next_page = None`) is a terminal
    /// non-error condition — no request is issued and state is unchanged
    /// apart from recording `EndReached`. An empty cache falls back to the
    /// initial load.
    pub async fn load_more(&self, list: &ListKey) -> Result<ListUiState> {
        {
            let state = self.ui_state(list);
            if state.phase.end_reached() {
                tracing::debug!(list = %list, "Append suppressed, end of list");
                return Ok(state);
            }
            if state.phase == LoadPhase::Empty && state.cached_count == 0 {
                // Nothing loaded yet: the first "more" is the initial load.
                return self.refresh(list).await;
            }
        }

        let lock = self.list_lock(&list.slug());
        let _guard = lock.lock().await;

        let boundary = match self.store.last_cached(list).await? {
            Some(b) => b,
            None => return self.refresh_locked(list).await,
        };

        let next_page = self
            .store
            .remote_key(list, boundary.id)
            .await?
            .and_then(|k| k.next_page);

        let Some(next_page) = next_page else {
            tracing::debug!(list = %list, boundary = boundary.id, "No next page, end of list");
            return Ok(self.with_entry(list, |e| {
                e.phase = LoadPhase::Loaded { end_reached: true };
                e.snapshot()
            }));
        };

        let prior = self.with_entry(list, |e| {
            let prior = ListPhaseSnapshot {
                cached_count: e.cached_count,
                end_reached: e.phase.end_reached(),
            };
            e.phase = LoadPhase::LoadingMore;
            e.error = None;
            prior
        });

        match self.remote.fetch_page(list, next_page).await {
            Ok(page) => {
                let end_reached = page.next_page.is_none();
                match self.store.apply_append(list, &page).await {
                    Ok(written) => {
                        let count = self.store.cached_count(list).await?;
                        tracing::info!(list = %list, page = next_page, titles = written, "Page appended");
                        Ok(self.with_entry(list, |e| {
                            e.phase = LoadPhase::Loaded { end_reached };
                            e.cached_count = count;
                            e.error = None;
                            e.last_failed = None;
                            e.snapshot()
                        }))
                    }
                    Err(e) => {
                        tracing::warn!(list = %list, error = %e, "Append write failed, cache left untouched");
                        Ok(self.record_failure(list, store_failure(), FailedOp::Append, prior))
                    }
                }
            }
            Err(e) => {
                tracing::warn!(list = %list, page = next_page, error = %e, "Append fetch failed");
                Ok(self.record_failure(list, classify(&e), FailedOp::Append, prior))
            }
        }
    }

    /// Refresh assuming the caller already holds the list lock.
    async fn refresh_locked(&self, list: &ListKey) -> Result<ListUiState> {
        let prior = self.with_entry(list, |e| {
            let prior = ListPhaseSnapshot {
                cached_count: e.cached_count,
                end_reached: e.phase.end_reached(),
            };
            e.phase = LoadPhase::Loading;
            e.error = None;
            prior
        });

        match self.remote.fetch_page(list, FIRST_PAGE).await {
            Ok(page) => {
                let end_reached = page.next_page.is_none();
                match self.store.apply_refresh(list, &page).await {
                    Ok(written) => {
                        tracing::info!(list = %list, titles = written, "List refreshed");
                        Ok(self.with_entry(list, |e| {
                            e.phase = LoadPhase::Loaded { end_reached };
                            e.cached_count = written as i64;
                            e.error = None;
                            e.last_failed = None;
                            e.snapshot()
                        }))
                    }
                    Err(e) => {
                        tracing::warn!(list = %list, error = %e, "Refresh write failed, cache left untouched");
                        Ok(self.record_failure(list, store_failure(), FailedOp::Refresh, prior))
                    }
                }
            }
            Err(e) => {
                tracing::warn!(list = %list, error = %e, "Refresh fetch failed");
                Ok(self.record_failure(list, classify(&e), FailedOp::Refresh, prior))
            }
        }
    }

    fn record_failure(
        &self,
        list: &ListKey,
        message: ErrorMessage,
        op: FailedOp,
        prior: ListPhaseSnapshot,
    ) -> ListUiState {
        self.with_entry(list, |e| {
            // Prior content stays visible: restore the loaded phase rather
            // than blanking to Empty when anything is cached.
            e.phase = if prior.cached_count > 0 {
                LoadPhase::Loaded {
                    end_reached: prior.end_reached,
                }
            } else {
                LoadPhase::Empty
            };
            e.error = Some(message);
            e.last_failed = Some(op);
            e.snapshot()
        })
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Dispatch a presentation-layer intent.
    ///
    /// `ClearError` is a pure state transition with no store interaction.
    /// `ChangeQuery` switches to (and refreshes) the search list for the new
    /// query; the returned state belongs to that list.
    pub async fn handle(&self, list: &ListKey, intent: Intent) -> Result<ListUiState> {
        match intent {
            Intent::Refresh => {
                self.with_entry(list, |e| e.is_retry = false);
                self.refresh(list).await
            }
            Intent::Retry => {
                let failed = self.with_entry(list, |e| {
                    e.is_retry = true;
                    e.last_failed
                });
                match failed {
                    Some(FailedOp::Append) => self.load_more(list).await,
                    _ => self.refresh(list).await,
                }
            }
            Intent::ClearError => Ok(self.with_entry(list, |e| {
                e.error = None;
                e.is_retry = false;
                e.snapshot()
            })),
            Intent::ChangeQuery(query) => {
                let search = ListKey::Search(query);
                self.with_entry(&search, |e| e.is_retry = false);
                self.refresh(&search).await
            }
        }
    }
}

/// Message for store-side write failures: retryable, not offline.
fn store_failure() -> ErrorMessage {
    ErrorMessage {
        key: MessageKey::Unknown,
        retryable: true,
        offline_fallback: false,
    }
}
