// src/store/memory.rs
// In-memory content store. Nothing is persisted; useful for tests and for
// callers that keep their own records.

use super::{ContentIdentifierStore, TrackedFile};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, TrackedFile>>,
    closed: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following upsert fail, to exercise store-failure paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TrackedFile>> {
        // A panic while holding this lock can't leave the map half-updated
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentIdentifierStore for MemoryStore {
    async fn lookup(&self, path: &str) -> Result<Option<TrackedFile>, StoreError> {
        self.ensure_open()?;
        Ok(self.lock().get(path).cloned())
    }

    async fn upsert(
        &self,
        path: &str,
        content_id: &str,
        local_size: u64,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                path: path.to_string(),
                reason: "writes disabled".into(),
            });
        }

        self.lock().insert(
            path.to_string(),
            TrackedFile {
                path: path.to_string(),
                content_id: content_id.to_string(),
                local_size,
                last_synced_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
