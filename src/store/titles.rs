use anyhow::Result;
use sqlx::{QueryBuilder, SqliteConnection};

use super::schema::Store;
use super::types::{CachedTitle, ListKey, RemoteTitle, TitleDbRow};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of titles to return from any single query (OOM protection)
const MAX_TITLES: i64 = 2000;

/// Default page size for the cached read view
pub(crate) const DEFAULT_VIEW_PAGE: i64 = 20;

/// Batch size for title inserts; 10 columns * 50 rows stays well under
/// SQLite's 999 bind-parameter limit.
const TITLE_BATCH_SIZE: usize = 50;

/// Insert a page of titles inside an existing transaction, assigning stable
/// per-list positions starting at `base_position`.
///
/// Conflict on (list, id) replaces the whole row — a re-fetched title is
/// never partially merged, and it keeps the rank it is re-written with.
pub(crate) async fn insert_titles_tx(
    conn: &mut SqliteConnection,
    list_slug: &str,
    titles: &[RemoteTitle],
    base_position: i64,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    for (chunk_index, chunk) in titles.chunks(TITLE_BATCH_SIZE).enumerate() {
        let chunk_base = base_position + (chunk_index * TITLE_BATCH_SIZE) as i64;

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "INSERT INTO titles (list_slug, id, title, overview, poster_path, \
             release_date, vote_average, popularity, position, fetched_at) ",
        );

        let mut offset: i64 = 0;
        builder.push_values(chunk, |mut b, title| {
            b.push_bind(list_slug)
                .push_bind(title.id)
                .push_bind(&title.title)
                .push_bind(&title.overview)
                .push_bind(&title.poster_path)
                .push_bind(&title.release_date)
                .push_bind(title.vote_average)
                .push_bind(title.popularity)
                .push_bind(chunk_base + offset)
                .push_bind(now);
            offset += 1;
        });

        builder.push(
            " ON CONFLICT(list_slug, id) DO UPDATE SET \
             title = excluded.title, overview = excluded.overview, \
             poster_path = excluded.poster_path, release_date = excluded.release_date, \
             vote_average = excluded.vote_average, popularity = excluded.popularity, \
             position = excluded.position, fetched_at = excluded.fetched_at",
        );

        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

impl Store {
    // ========================================================================
    // Cached Title Queries
    // ========================================================================

    /// Read one window of cached titles for a list, ordered by the stable
    /// write-time rank. Hard cap at MAX_TITLES to prevent OOM.
    pub async fn cached_titles(
        &self,
        list: &ListKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CachedTitle>> {
        let limit = limit.min(MAX_TITLES);
        tracing::debug!(list = %list, limit = limit, offset = offset, "cached_titles read");

        let rows = sqlx::query_as::<_, TitleDbRow>(
            r#"
            SELECT id, title, overview, poster_path, release_date,
                   vote_average, popularity, position, fetched_at
            FROM titles
            WHERE list_slug = ?
            ORDER BY position
            LIMIT ? OFFSET ?
        "#,
        )
        .bind(list.slug())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TitleDbRow::into_cached).collect())
    }

    /// Get a single cached title by id within a list.
    pub async fn cached_title(&self, list: &ListKey, id: i64) -> Result<Option<CachedTitle>> {
        let row = sqlx::query_as::<_, TitleDbRow>(
            r#"
            SELECT id, title, overview, poster_path, release_date,
                   vote_average, popularity, position, fetched_at
            FROM titles
            WHERE list_slug = ? AND id = ?
        "#,
        )
        .bind(list.slug())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TitleDbRow::into_cached))
    }

    /// The boundary item at the loaded end of a list (highest rank), used by
    /// the paging session to look up the next-page cursor.
    pub async fn last_cached(&self, list: &ListKey) -> Result<Option<CachedTitle>> {
        let row = sqlx::query_as::<_, TitleDbRow>(
            r#"
            SELECT id, title, overview, poster_path, release_date,
                   vote_average, popularity, position, fetched_at
            FROM titles
            WHERE list_slug = ?
            ORDER BY position DESC
            LIMIT 1
        "#,
        )
        .bind(list.slug())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TitleDbRow::into_cached))
    }

    /// Number of cached titles for a list.
    pub async fn cached_count(&self, list: &ListKey) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM titles WHERE list_slug = ?")
                .bind(list.slug())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    /// Delete a list's cached titles and cursors in one transaction.
    pub async fn clear_list(&self, list: &ListKey) -> Result<u64> {
        let slug = list.slug();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM remote_keys WHERE list_slug = ?")
            .bind(&slug)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM titles WHERE list_slug = ?")
            .bind(&slug)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Restartable paged read view over a list's cached titles.
    pub fn view(&self, list: ListKey) -> CachedTitlesView {
        CachedTitlesView::new(self.clone(), list, DEFAULT_VIEW_PAGE)
    }

    /// Read view with a caller-chosen window size.
    pub fn view_with_page_size(&self, list: ListKey, page_size: i64) -> CachedTitlesView {
        CachedTitlesView::new(self.clone(), list, page_size)
    }
}

// ============================================================================
// Cached Titles View
// ============================================================================

/// Restartable, lazily paged read view over the persisted title rows.
///
/// Each `next_window` call materializes the next window from the store, so a
/// reader sees writes that land between calls. `restart` rewinds to the head
/// without dropping the view. Correctness does not depend on any subscriber:
/// dropping the view mid-iteration has no effect on the cache.
pub struct CachedTitlesView {
    store: Store,
    list: ListKey,
    page_size: i64,
    offset: i64,
}

impl CachedTitlesView {
    pub(crate) fn new(store: Store, list: ListKey, page_size: i64) -> Self {
        Self {
            store,
            list,
            page_size: page_size.max(1),
            offset: 0,
        }
    }

    /// The list this view reads.
    pub fn list(&self) -> &ListKey {
        &self.list
    }

    /// Fetch the next window of cached titles. An empty result means the
    /// reader has caught up with the cached tail.
    pub async fn next_window(&mut self) -> Result<Vec<CachedTitle>> {
        let rows = self
            .store
            .cached_titles(&self.list, self.page_size, self.offset)
            .await?;
        self.offset += rows.len() as i64;
        Ok(rows)
    }

    /// Rewind to the head of the list.
    pub fn restart(&mut self) {
        self.offset = 0;
    }
}
