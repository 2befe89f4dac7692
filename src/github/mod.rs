// src/github/mod.rs
// =============================================================================
// This module handles everything that talks to GitHub.
//
// Submodules:
// - reference: parse the folder URL into owner/repo/branch/path
// - fetch: the contents API client (listing folders, downloading files)
// - retry: bounded retry with backoff for rate limits and flaky networks
//
// The sync engine only sees the two traits defined here, RemoteTreeClient
// and FileFetcher. GithubClient implements both for the real API; tests
// plug in in-memory fakes.
// =============================================================================

mod fetch;
mod reference;
mod retry;

pub use fetch::GithubClient;
pub use reference::{join_path, RepoRef};
pub use retry::{with_retry, RetryDecision, RetryPolicy, RetryState};

use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// What kind of object a listing entry is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Submodules, symlinks, anything else; holds the type GitHub reported
    Unsupported(String),
}

/// One child of a remote folder, as returned by a single listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Path relative to the folder the session started at
    pub path: String,
    pub kind: EntryKind,
    /// Server-assigned content hash (the git blob SHA for GitHub)
    pub content_id: String,
    /// Where the raw bytes can be downloaded from
    pub fetch_ref: String,
}

impl RemoteEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// A file body, delivered in chunks as it arrives.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Lists the immediate children of a remote folder.
#[async_trait]
pub trait RemoteTreeClient: Send + Sync {
    /// `path` is relative to `reference.path`; returned entry paths are too.
    async fn list_children(
        &self,
        reference: &RepoRef,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, FetchError>;
}

/// Downloads the raw bytes of a single file entry.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, entry: &RemoteEntry) -> Result<ByteStream, FetchError>;
}
