use anyhow::Result;
use sqlx::{QueryBuilder, SqliteConnection};

use super::schema::Store;
use super::types::{ListKey, RemoteKey};

/// Batch size for key upserts; 4 columns * 100 rows stays well under
/// SQLite's 999 bind-parameter limit.
const KEY_BATCH_SIZE: usize = 100;

/// Upsert key records inside an existing transaction.
///
/// On conflict by (list, title) the new record fully replaces the old, so
/// re-applying the same page is idempotent.
pub(crate) async fn upsert_keys_tx(
    conn: &mut SqliteConnection,
    list_slug: &str,
    records: &[RemoteKey],
) -> Result<()> {
    for chunk in records.chunks(KEY_BATCH_SIZE) {
        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "INSERT INTO remote_keys (list_slug, title_id, prev_page, next_page) ",
        );

        builder.push_values(chunk, |mut b, key| {
            b.push_bind(list_slug)
                .push_bind(key.title_id)
                .push_bind(key.prev_page)
                .push_bind(key.next_page);
        });

        builder.push(
            " ON CONFLICT(list_slug, title_id) DO UPDATE SET \
             prev_page = excluded.prev_page, next_page = excluded.next_page",
        );

        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

impl Store {
    // ========================================================================
    // Remote Key Operations
    // ========================================================================

    /// Look up the cursor record for a boundary item.
    ///
    /// Returns `None` when no cursor exists — an absent cursor is a normal
    /// "no adjacent page known" signal, not a failure.
    pub async fn remote_key(&self, list: &ListKey, title_id: i64) -> Result<Option<RemoteKey>> {
        let key = sqlx::query_as::<_, RemoteKey>(
            r#"
            SELECT title_id, prev_page, next_page
            FROM remote_keys
            WHERE list_slug = ? AND title_id = ?
        "#,
        )
        .bind(list.slug())
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    /// Replace a list's cursor records wholesale, in one transaction.
    ///
    /// Records not present in `records` are dropped; an empty slice clears
    /// the list's cursors. Page-load transactions go through
    /// `apply_refresh`/`apply_append`, which write keys and titles atomically;
    /// this standalone variant wraps its own transaction.
    pub async fn replace_remote_keys(&self, list: &ListKey, records: &[RemoteKey]) -> Result<()> {
        let slug = list.slug();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM remote_keys WHERE list_slug = ?")
            .bind(&slug)
            .execute(&mut *tx)
            .await?;
        upsert_keys_tx(&mut tx, &slug, records).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete every cursor record for a list.
    ///
    /// Used at the start of a forced refresh so stale cursors from a previous
    /// session can never be mixed with a new page's items.
    pub async fn clear_remote_keys(&self, list: &ListKey) -> Result<u64> {
        let result = sqlx::query("DELETE FROM remote_keys WHERE list_slug = ?")
            .bind(list.slug())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
