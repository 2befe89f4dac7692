// src/store/mod.rs
// =============================================================================
// The content identifier store: a persisted table of
//   relative path -> (content hash, local size, last synced at)
//
// This is how we know a file hasn't changed since the last run without
// downloading it again. A row is only written after the file's bytes are
// on disk, so a row always describes content we actually have.
//
// Implementations:
// - SqliteStore: the real thing, one SQLite file under <output>/database/
// - MemoryStore: in-process map for tests and embedding callers
// =============================================================================

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// What we remember about a file from its last successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: String,
    pub content_id: String,
    pub local_size: u64,
    pub last_synced_at: DateTime<Utc>,
}

/// Persisted path -> content hash mapping.
///
/// Implementations must be safe to call from many tasks at once without
/// the caller holding any lock.
#[async_trait]
pub trait ContentIdentifierStore: Send + Sync {
    /// Returns `Ok(None)` for paths we've never recorded.
    async fn lookup(&self, path: &str) -> Result<Option<TrackedFile>, StoreError>;

    /// Records `path` as synced at `content_id`. Durable once this returns.
    ///
    /// Writing the same pair twice leaves one row, with a fresh timestamp.
    async fn upsert(&self, path: &str, content_id: &str, local_size: u64)
        -> Result<(), StoreError>;

    /// Flushes and releases the underlying storage. Later calls fail with
    /// `StoreError::Closed`.
    async fn close(&self) -> Result<(), StoreError>;
}
