use crate::catalog::FetchError;
use crate::store::ListKey;

// ============================================================================
// Load State Machine
// ============================================================================

/// Per-list load phase: `Empty → Loading → Loaded ⇄ LoadingMore`, with errors
/// recorded alongside rather than as a phase so previously loaded content
/// stays visible on failure. `end_reached` is a sub-state of `Loaded` that
/// suppresses further append fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Nothing cached and no fetch started
    Empty,
    /// Initial load or forced refresh in flight
    Loading,
    /// Scroll-driven append in flight
    LoadingMore,
    /// At least one page is cached
    Loaded { end_reached: bool },
}

impl LoadPhase {
    pub fn end_reached(&self) -> bool {
        matches!(self, LoadPhase::Loaded { end_reached: true })
    }
}

// ============================================================================
// Error Messages
// ============================================================================

/// Opaque message key surfaced to the rendering layer.
///
/// Rendering maps keys to localized strings; it never branches on failure
/// internals. Offline gets its own key so the UI can offer a
/// "use cached data" affordance distinct from generic failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    Offline,
    Server,
    RateLimited,
    Unknown,
}

impl MessageKey {
    /// Resource-style identifier for the rendering layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::Offline => "error.offline",
            MessageKey::Server => "error.server",
            MessageKey::RateLimited => "error.rate_limited",
            MessageKey::Unknown => "error.unknown",
        }
    }
}

/// User-facing failure summary held in [`ListUiState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    pub key: MessageKey,
    /// Whether a retry affordance should be shown
    pub retryable: bool,
    /// Whether a "browse cached data" affordance should be shown (offline)
    pub offline_fallback: bool,
}

/// Explicit mapping from fetch failure to message key.
///
/// One table, not conditionals scattered through the session code.
pub fn classify(err: &FetchError) -> ErrorMessage {
    let key = match err {
        FetchError::Offline(_) => MessageKey::Offline,
        FetchError::Server(_) => MessageKey::Server,
        FetchError::RateLimited(_) => MessageKey::RateLimited,
        FetchError::Network(_)
        | FetchError::Timeout
        | FetchError::HttpStatus(_)
        | FetchError::Decode(_)
        | FetchError::ResponseTooLarge
        | FetchError::IncompleteResponse { .. } => MessageKey::Unknown,
    };

    ErrorMessage {
        key,
        retryable: err.is_retryable(),
        offline_fallback: matches!(key, MessageKey::Offline),
    }
}

// ============================================================================
// UI State and Intents
// ============================================================================

/// Ephemeral per-list presentation state.
///
/// A pure projection: it performs no I/O and holds no authority over
/// correctness — the store is the only durable state, and this snapshot is
/// rebuilt fresh every session. Cached rows themselves are read through
/// [`crate::store::CachedTitlesView`].
#[derive(Debug, Clone)]
pub struct ListUiState {
    /// Which logical list is displayed
    pub list: ListKey,
    pub phase: LoadPhase,
    /// Number of titles currently cached for the list
    pub cached_count: i64,
    /// Set while the in-flight or last-finished fetch was user-initiated retry
    pub is_retry: bool,
    /// Last fetch failure, if any; prior content stays readable regardless
    pub error: Option<ErrorMessage>,
}

/// Event intents accepted from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Forced full refresh (pull-to-refresh): clean reload of page 1
    Refresh,
    /// Re-run the last failed operation
    Retry,
    /// Dismiss the current error; pure state transition, no store interaction
    ClearError,
    /// Switch the session to a new search query and refresh it
    ChangeQuery(String),
}
