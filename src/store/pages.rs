use anyhow::Result;

use super::keys::upsert_keys_tx;
use super::schema::Store;
use super::titles::insert_titles_tx;
use super::types::{ListKey, RemoteKey, RemotePage};

fn page_keys(page: &RemotePage) -> Vec<RemoteKey> {
    page.titles
        .iter()
        .map(|t| RemoteKey {
            title_id: t.id,
            prev_page: page.prev_page,
            next_page: page.next_page,
        })
        .collect()
}

impl Store {
    // ========================================================================
    // Page-Load Transactions
    // ========================================================================

    /// Apply a full refresh: clear the list's cursors and rows, then write the
    /// first page's rows and fresh key records, all in one transaction.
    ///
    /// Readers never observe a cleared-but-unpopulated list — an interrupted
    /// refresh rolls back to the pre-refresh state. Returns the number of
    /// titles written.
    pub async fn apply_refresh(&self, list: &ListKey, page: &RemotePage) -> Result<usize> {
        let slug = list.slug();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM remote_keys WHERE list_slug = ?")
            .bind(&slug)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM titles WHERE list_slug = ?")
            .bind(&slug)
            .execute(&mut *tx)
            .await?;

        if !page.titles.is_empty() {
            insert_titles_tx(&mut tx, &slug, &page.titles, 0).await?;
            upsert_keys_tx(&mut tx, &slug, &page_keys(page)).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            list = %list,
            titles = page.titles.len(),
            next_page = ?page.next_page,
            "Applied list refresh"
        );
        Ok(page.titles.len())
    }

    /// Apply an appended page: write the new page's rows (ranks continuing
    /// from the cached tail) and upsert only that page's key records, in one
    /// transaction. Prior pages are left untouched.
    pub async fn apply_append(&self, list: &ListKey, page: &RemotePage) -> Result<usize> {
        if page.titles.is_empty() {
            return Ok(0);
        }

        let slug = list.slug();
        let mut tx = self.pool.begin().await?;

        // Rank continues from the current tail; computed inside the
        // transaction so concurrent writers for other lists cannot skew it.
        let base: (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM titles WHERE list_slug = ?",
        )
        .bind(&slug)
        .fetch_one(&mut *tx)
        .await?;

        insert_titles_tx(&mut tx, &slug, &page.titles, base.0).await?;
        upsert_keys_tx(&mut tx, &slug, &page_keys(page)).await?;

        tx.commit().await?;

        tracing::debug!(
            list = %list,
            titles = page.titles.len(),
            base_position = base.0,
            next_page = ?page.next_page,
            "Applied list append"
        );
        Ok(page.titles.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{ListKey, RemotePage, RemoteTitle, Store};

    fn title(id: i64, name: &str) -> RemoteTitle {
        RemoteTitle {
            id,
            title: name.to_string(),
            overview: None,
            poster_path: None,
            release_date: None,
            vote_average: 6.0,
            popularity: 50.0,
        }
    }

    fn page(titles: Vec<RemoteTitle>, prev: Option<i64>, next: Option<i64>) -> RemotePage {
        RemotePage {
            titles,
            prev_page: prev,
            next_page: next,
        }
    }

    async fn test_store() -> Store {
        Store::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_refresh_writes_exactly_page_one() {
        let store = test_store().await;
        let list = ListKey::Upcoming;

        let count = store
            .apply_refresh(
                &list,
                &page(
                    vec![title(1, "A"), title(2, "B"), title(3, "C")],
                    None,
                    Some(2),
                ),
            )
            .await
            .unwrap();
        assert_eq!(count, 3);

        let cached = store.cached_titles(&list, 10, 0).await.unwrap();
        let ids: Vec<_> = cached.iter().map(|t| t.id).collect();
        assert_eq!(ids, [1, 2, 3]);

        // Key for the boundary item carries no previous page after a refresh.
        let boundary = store.last_cached(&list).await.unwrap().unwrap();
        let key = store
            .remote_key(&list, boundary.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key.prev_page, None);
        assert_eq!(key.next_page, Some(2));
    }

    #[tokio::test]
    async fn test_refresh_clears_previous_session() {
        let store = test_store().await;
        let list = ListKey::Upcoming;

        store
            .apply_refresh(&list, &page(vec![title(1, "Old")], None, Some(2)))
            .await
            .unwrap();
        store
            .apply_append(&list, &page(vec![title(2, "Old2")], Some(1), None))
            .await
            .unwrap();

        store
            .apply_refresh(&list, &page(vec![title(9, "New")], None, None))
            .await
            .unwrap();

        let cached = store.cached_titles(&list, 10, 0).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, 9);
        // Stale cursors from the old session are gone.
        assert!(store.remote_key(&list, 1).await.unwrap().is_none());
        assert!(store.remote_key(&list, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_continues_ranking() {
        let store = test_store().await;
        let list = ListKey::Popular;

        store
            .apply_refresh(
                &list,
                &page(
                    vec![title(1, "A"), title(2, "B"), title(3, "C")],
                    None,
                    Some(2),
                ),
            )
            .await
            .unwrap();
        store
            .apply_append(
                &list,
                &page(vec![title(4, "D"), title(5, "E")], Some(1), None),
            )
            .await
            .unwrap();

        let cached = store.cached_titles(&list, 10, 0).await.unwrap();
        let ids: Vec<_> = cached.iter().map(|t| t.id).collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);

        let key = store.remote_key(&list, 5).await.unwrap().unwrap();
        assert_eq!(key.next_page, None);
        // Page-1 cursors are untouched by the append.
        let first = store.remote_key(&list, 1).await.unwrap().unwrap();
        assert_eq!(first.next_page, Some(2));
    }

    #[tokio::test]
    async fn test_refresh_with_empty_page() {
        let store = test_store().await;
        let list = ListKey::Search("zzz no match".to_string());

        store
            .apply_refresh(&list, &page(vec![], None, None))
            .await
            .unwrap();
        assert_eq!(store.cached_count(&list).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_empty_page_is_noop() {
        let store = test_store().await;
        let list = ListKey::Upcoming;
        store
            .apply_refresh(&list, &page(vec![title(1, "A")], None, Some(2)))
            .await
            .unwrap();

        let count = store
            .apply_append(&list, &page(vec![], Some(1), None))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(store.cached_count(&list).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_refresh_rolls_back_to_prior_state() {
        let store = test_store().await;
        let list = ListKey::Upcoming;
        store
            .apply_refresh(
                &list,
                &page(vec![title(1, "A"), title(2, "B")], None, Some(2)),
            )
            .await
            .unwrap();

        // Refresh-style transaction interrupted after the deletes: dropping
        // the transaction without committing must leave the pre-clear state,
        // never a cleared-but-unpopulated one.
        {
            let mut tx = store.pool.begin().await.unwrap();
            sqlx::query("DELETE FROM remote_keys WHERE list_slug = ?")
                .bind(list.slug())
                .execute(&mut *tx)
                .await
                .unwrap();
            sqlx::query("DELETE FROM titles WHERE list_slug = ?")
                .bind(list.slug())
                .execute(&mut *tx)
                .await
                .unwrap();
        }

        assert_eq!(store.cached_count(&list).await.unwrap(), 2);
        let cached = store.cached_titles(&list, 10, 0).await.unwrap();
        let ids: Vec<_> = cached.iter().map(|t| t.id).collect();
        assert_eq!(ids, [1, 2]);
        let key = store.remote_key(&list, 2).await.unwrap().unwrap();
        assert_eq!(key.prev_page, None);
        assert_eq!(key.next_page, Some(2));
    }

    #[tokio::test]
    async fn test_reapplying_same_page_is_idempotent() {
        let store = test_store().await;
        let list = ListKey::Upcoming;
        let p = page(vec![title(1, "A"), title(2, "B")], None, Some(2));

        store.apply_refresh(&list, &p).await.unwrap();
        store.apply_refresh(&list, &p).await.unwrap();

        assert_eq!(store.cached_count(&list).await.unwrap(), 2);
        let cached = store.cached_titles(&list, 10, 0).await.unwrap();
        assert_eq!(cached[0].position, 0);
        assert_eq!(cached[1].position, 1);
    }
}
