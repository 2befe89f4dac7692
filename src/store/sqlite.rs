// src/store/sqlite.rs
// =============================================================================
// SQLite-backed content identifier store.
//
// rusqlite's Connection is blocking and not Sync, so:
// - the connection sits behind a Mutex, which serializes every statement
//   (two upserts for the same path can never interleave)
// - each call runs on tokio's blocking pool via spawn_blocking so a slow
//   disk never stalls the async workers doing downloads
//
// Each upsert is its own autocommit transaction with synchronous=FULL,
// so once it returns the row survives a crash.
// =============================================================================

use super::{ContentIdentifierStore, TrackedFile};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

const SCHEMA: &str = "
    PRAGMA synchronous = FULL;
    CREATE TABLE IF NOT EXISTS tracked_files (
        path            TEXT PRIMARY KEY,
        content_id      TEXT NOT NULL,
        local_size      INTEGER NOT NULL,
        last_synced_at  TEXT NOT NULL
    );
";

pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Opens (or creates) the store at `path` and makes sure the table exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_error = |e: rusqlite::Error| StoreError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let conn = Connection::open(path).map_err(open_error)?;
        conn.execute_batch(SCHEMA).map_err(open_error)?;
        debug!(path = %path.display(), "opened content store");

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Runs `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Worker("connection lock poisoned".into()))?;
            match guard.as_ref() {
                Some(conn) => f(conn),
                None => Err(StoreError::Closed),
            }
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl ContentIdentifierStore for SqliteStore {
    async fn lookup(&self, path: &str) -> Result<Option<TrackedFile>, StoreError> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let query_error = |reason: String| StoreError::Query {
                path: path.clone(),
                reason,
            };

            let row = conn
                .query_row(
                    "SELECT content_id, local_size, last_synced_at
                     FROM tracked_files WHERE path = ?1",
                    params![path],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| query_error(e.to_string()))?;

            let Some((content_id, local_size, synced_at)) = row else {
                return Ok(None);
            };

            let last_synced_at = DateTime::parse_from_rfc3339(&synced_at)
                .map_err(|e| query_error(format!("bad timestamp '{}': {}", synced_at, e)))?
                .with_timezone(&Utc);

            Ok(Some(TrackedFile {
                path: path.clone(),
                content_id,
                local_size: local_size.max(0) as u64,
                last_synced_at,
            }))
        })
        .await
    }

    async fn upsert(
        &self,
        path: &str,
        content_id: &str,
        local_size: u64,
    ) -> Result<(), StoreError> {
        let path = path.to_string();
        let content_id = content_id.to_string();
        let synced_at = Utc::now().to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tracked_files (path, content_id, local_size, last_synced_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(path) DO UPDATE SET
                    content_id = excluded.content_id,
                    local_size = excluded.local_size,
                    last_synced_at = excluded.last_synced_at",
                params![path, content_id, local_size as i64, synced_at],
            )
            .map_err(|e| StoreError::Write {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Worker("connection lock poisoned".into()))?;
            match guard.take() {
                Some(conn) => conn.close().map_err(|(_, e)| StoreError::Write {
                    path: path.display().to_string(),
                    reason: format!("failed to close: {}", e),
                }),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("files.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_lookup_missing_returns_none() {
        let (_dir, store) = open_temp();
        assert_eq!(store.lookup("nope.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_then_lookup() {
        let (_dir, store) = open_temp();
        store.upsert("sub/a.txt", "abc123", 42).await.unwrap();

        let tracked = store.lookup("sub/a.txt").await.unwrap().unwrap();
        assert_eq!(tracked.path, "sub/a.txt");
        assert_eq!(tracked.content_id, "abc123");
        assert_eq!(tracked.local_size, 42);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_refreshes_timestamp() {
        let (_dir, store) = open_temp();
        store.upsert("a.txt", "v1", 1).await.unwrap();
        let first = store.lookup("a.txt").await.unwrap().unwrap();

        store.upsert("a.txt", "v1", 1).await.unwrap();
        let second = store.lookup("a.txt").await.unwrap().unwrap();

        assert_eq!(second.content_id, "v1");
        assert!(second.last_synced_at >= first.last_synced_at);

        let rows: i64 = store
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM tracked_files", [], |r| r.get(0))
                    .map_err(|e| StoreError::Worker(e.to_string()))
            })
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("files.db");

        let store = SqliteStore::open(&db).unwrap();
        store.upsert("a.txt", "v2", 10).await.unwrap();
        store.close().await.unwrap();

        let reopened = SqliteStore::open(&db).unwrap();
        let tracked = reopened.lookup("a.txt").await.unwrap().unwrap();
        assert_eq!(tracked.content_id, "v2");
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let (_dir, store) = open_temp();
        store.close().await.unwrap();

        assert!(matches!(store.lookup("a.txt").await, Err(StoreError::Closed)));
        assert!(matches!(
            store.upsert("a.txt", "v1", 1).await,
            Err(StoreError::Closed)
        ));
        // closing twice is fine
        store.close().await.unwrap();
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteStore::open(&dir.path().join("missing").join("files.db"));
        assert!(matches!(result, Err(StoreError::Open { .. })));
    }
}
