use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StoreError;

// ============================================================================
// Store
// ============================================================================

/// Durable paged cache: cached titles plus the remote-key cursor records
/// needed to resume pagination after process death or cache invalidation.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
}

impl Store {
    /// Open the cache database and run migrations
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InstanceLocked` if another instance of marquee
    /// has the database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `StoreError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Set database file permissions BEFORE pool creation so there is no
        // window where the file exists with default umask permissions.
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::PermissionsExt;
            let db_path = std::path::Path::new(path);
            if db_path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                if let Err(e) = std::fs::set_permissions(path, perms) {
                    tracing::warn!(path = %path, error = %e, "Failed to set cache file permissions");
                }
            } else if let Some(parent) = db_path.parent() {
                if parent.exists() {
                    // Pre-create the file with mode(0o600) at creation time,
                    // eliminating the TOCTOU window between create and chmod.
                    use std::os::unix::fs::OpenOptionsExt;
                    let _file = std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .mode(0o600)
                        .open(db_path)
                        .ok(); // If creation fails, SQLite reports the error at connect_with.
                }
            }
        }

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Handles transient contention between
        // concurrent list refreshes automatically. Using pragma() ensures all
        // connections in the pool inherit the setting.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StoreError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // SQLite is single-writer; 5 connections covers peak concurrent readers
        // (several list sessions paging while the UI reads cached rows).
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;
        let store = Self { pool };
        store.migrate().await.map_err(|e| {
            // Migration errors could also be lock-related
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                StoreError::InstanceLocked
            } else {
                StoreError::Migration(e.to_string())
            }
        })?;
        Ok(store)
    }

    /// Run schema migrations atomically within a transaction.
    ///
    /// All schema changes are wrapped in a single transaction so a failure
    /// (disk full, power loss) rolls the whole migration back, leaving the
    /// database in its previous consistent state. All statements use
    /// `IF NOT EXISTS`, so re-running on an existing database is a no-op.
    async fn migrate(&self) -> Result<()> {
        // Enable foreign keys (must be outside transaction, per-connection setting)
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        // Cached titles, one row per title per logical list. Whole-row replace
        // on conflict: pages are never partially merged into an existing row.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS titles (
                list_slug TEXT NOT NULL,
                id INTEGER NOT NULL,
                title TEXT NOT NULL,
                overview TEXT,
                poster_path TEXT,
                release_date TEXT,
                vote_average REAL NOT NULL DEFAULT 0,
                popularity REAL NOT NULL DEFAULT 0,
                position INTEGER NOT NULL,
                fetched_at INTEGER NOT NULL,
                PRIMARY KEY (list_slug, id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Remote-key cursors, keyed by the boundary item they were fetched
        // alongside, scoped per list. At most one record per (list, title).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS remote_keys (
                list_slug TEXT NOT NULL,
                title_id INTEGER NOT NULL,
                prev_page INTEGER,
                next_page INTEGER,
                PRIMARY KEY (list_slug, title_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Covering index for the paged read view: filters by list, orders by
        // the stable write-time rank.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_titles_list_position ON titles(list_slug, position)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = Store::open(":memory:").await.unwrap();
        // Migration is idempotent; a second pass over the same pool is a no-op.
        store.migrate().await.unwrap();
    }
}
