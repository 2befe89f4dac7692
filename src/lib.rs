// src/lib.rs
// =============================================================================
// gh-folder-sync: mirror a folder of a GitHub repository onto local disk,
// downloading only files whose content changed since the last run.
//
// Modules:
// - github: URL parsing, the contents API client, retry/backoff
// - store: persisted path -> content hash records
// - sync: the engine that walks the tree and decides what to download
// - config: run settings and the output directory layout
// - error: error types shared by all of the above
// =============================================================================

pub mod config;
pub mod error;
pub mod github;
pub mod store;
pub mod sync;

pub use config::{OutputLayout, SyncConfig};
pub use error::{FetchError, ReferenceError, StoreError, SyncError};
pub use github::{GithubClient, RepoRef};
pub use store::{ContentIdentifierStore, MemoryStore, SqliteStore, TrackedFile};
pub use sync::{StopHandle, SyncEngine, SyncOptions, SyncReport};
