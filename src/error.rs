// src/error.rs
// =============================================================================
// Error types for the sync library.
//
// Every failure falls into one of a few buckets, and each bucket has a
// different blast radius:
// - ReferenceError: the folder URL is malformed. Fatal, no network call made.
// - FetchError: GitHub said no (or the network did). Fatal for a subtree when
//   it happens during a listing, a per-file failure when it happens while
//   downloading a file.
// - WriteError: we couldn't put the bytes on disk. Per-file failure.
// - StoreError: the hash database is unusable. Fatal for the whole session.
// - SyncError: what the top-level call returns when a session can't finish.
//
// Rust concepts:
// - thiserror: derives Display and std::error::Error for our enums
// - #[from]: lets the ? operator convert one error type into another
// =============================================================================

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The folder URL could not be turned into (owner, repo, branch, path).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("invalid URL '{0}'")]
    Malformed(String),

    #[error("URL must be a GitHub URL (got host '{0}')")]
    NotGithub(String),

    #[error("URL must point to a folder in a GitHub repository: {0}")]
    NotAFolder(String),
}

/// Failures talking to GitHub, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Path, repository, or branch does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials missing, wrong, or not allowed to see this resource
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// GitHub asked us to slow down; `retry_after` is its hint, if any
    #[error("rate limited by GitHub (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Timeouts, resets, 5xx responses
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// The response didn't look like what the contents API returns
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl FetchError {
    /// True for errors the retry loop should try again on.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::TransientNetwork(_)
        )
    }
}

/// Writing a downloaded file to the output directory failed.
#[derive(Debug, Error)]
#[error("failed to write {path}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// The persisted path -> content hash table failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("store lookup failed for '{path}': {reason}")]
    Query { path: String, reason: String },

    #[error("store write failed for '{path}': {reason}")]
    Write { path: String, reason: String },

    #[error("store is closed")]
    Closed,

    #[error("store worker failed: {0}")]
    Worker(String),
}

/// Why a single file could not be synced. Never aborts sibling files.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Errors that end a whole sync session.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),

    /// Listing the root folder failed, so nothing could be synced
    #[error("failed to list '{path}': {source}")]
    Listing {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to prepare {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    /// True when the requested folder (or its repo/branch) doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SyncError::Listing {
                source: FetchError::NotFound(_),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::TransientNetwork("reset".into()).is_retryable());
        assert!(FetchError::RateLimited { retry_after: None }.is_retryable());
        assert!(!FetchError::NotFound("x".into()).is_retryable());
        assert!(!FetchError::Unauthorized("x".into()).is_retryable());
        assert!(!FetchError::Protocol("x".into()).is_retryable());
    }

    #[test]
    fn test_not_found_detection() {
        let err = SyncError::Listing {
            path: "docs".into(),
            source: FetchError::NotFound("docs".into()),
        };
        assert!(err.is_not_found());
        assert!(!SyncError::Store(StoreError::Closed).is_not_found());
    }
}
