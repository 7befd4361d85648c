use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Store-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another instance of the application has locked the database
    #[error("Another instance of marquee appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Cache migration failed: {0}")]
    Migration(String),

    /// A write invariant was violated (should not occur in correct operation)
    #[error("Cache integrity error: {0}")]
    Integrity(String),

    /// Generic database error
    #[error("Cache error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }
}

// ============================================================================
// List Keys
// ============================================================================

/// A logical paged list served by the catalog.
///
/// The fixed categories map to catalog endpoints; `Search` is an ad-hoc list
/// keyed by its query string. One generic store serves every variant — the
/// list key becomes the `list_slug` column, never a per-category table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListKey {
    Upcoming,
    TopRated,
    NowPlaying,
    Popular,
    Search(String),
}

impl ListKey {
    /// Stable identifier used as the `list_slug` column value.
    ///
    /// Search slugs embed the lowercased query so distinct queries never
    /// share cached rows or cursors.
    pub fn slug(&self) -> String {
        match self {
            ListKey::Upcoming => "upcoming".to_string(),
            ListKey::TopRated => "top-rated".to_string(),
            ListKey::NowPlaying => "now-playing".to_string(),
            ListKey::Popular => "popular".to_string(),
            ListKey::Search(query) => format!("search:{}", query.trim().to_lowercase()),
        }
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKey::Upcoming => write!(f, "upcoming"),
            ListKey::TopRated => write!(f, "top-rated"),
            ListKey::NowPlaying => write!(f, "now-playing"),
            ListKey::Popular => write!(f, "popular"),
            ListKey::Search(query) => write!(f, "search \"{}\"", query),
        }
    }
}

impl FromStr for ListKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(ListKey::Upcoming),
            "top-rated" | "top_rated" => Ok(ListKey::TopRated),
            "now-playing" | "now_playing" => Ok(ListKey::NowPlaying),
            "popular" => Ok(ListKey::Popular),
            other => Err(format!(
                "unknown list '{}' (expected upcoming, top-rated, now-playing or popular)",
                other
            )),
        }
    }
}

// ============================================================================
// Helper Types
// ============================================================================

/// A title decoded from a remote catalog page, ready for caching
#[derive(Debug, Clone)]
pub struct RemoteTitle {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: f64,
    pub popularity: f64,
}

/// One page fetched from the remote catalog.
///
/// `prev_page`/`next_page` are the adjacent page tokens; `None` means the
/// corresponding edge of the list has been reached.
#[derive(Debug, Clone)]
pub struct RemotePage {
    pub titles: Vec<RemoteTitle>,
    pub prev_page: Option<i64>,
    pub next_page: Option<i64>,
}

/// Cursor record for resuming pagination at a boundary item.
///
/// Keyed by the cached title it was fetched alongside (scoped per list),
/// so the paging session can discover adjacent-page tokens from whichever
/// item sits at the loaded edge.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RemoteKey {
    pub title_id: i64,
    pub prev_page: Option<i64>,
    pub next_page: Option<i64>,
}

/// Internal row type for title queries (used by sqlx FromRow)
/// Converts to CachedTitle via into_cached() with Arc wrapping
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TitleDbRow {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: f64,
    pub popularity: f64,
    pub position: i64,
    pub fetched_at: i64,
}

impl TitleDbRow {
    pub(crate) fn into_cached(self) -> CachedTitle {
        CachedTitle {
            id: self.id,
            title: Arc::from(self.title),
            overview: self.overview.map(Arc::from),
            poster_path: self.poster_path.map(Arc::from),
            release_date: self.release_date.map(Arc::from),
            vote_average: self.vote_average,
            popularity: self.popularity,
            position: self.position,
            fetched_at: self.fetched_at,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Cached title from the store
///
/// `position` is the stable per-list rank assigned when the page was written;
/// cached reads order by it so boundary detection is deterministic across
/// restarts. String fields use `Arc<str>` for cheap cloning into UI snapshots.
#[derive(Debug, Clone)]
pub struct CachedTitle {
    pub id: i64,
    pub title: Arc<str>,
    pub overview: Option<Arc<str>>,
    pub poster_path: Option<Arc<str>>,
    pub release_date: Option<Arc<str>>,
    pub vote_average: f64,
    pub popularity: f64,
    pub position: i64,
    pub fetched_at: i64,
}
