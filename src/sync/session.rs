// src/sync/session.rs
// =============================================================================
// Bookkeeping for one sync run.
//
// A SyncSession is shared by every task of one top-level call. Counters are
// atomics and the failure lists sit behind short-lived mutexes, so tasks
// fetching different files never wait on each other for long.
//
// At the end the session is turned into a SyncReport, which is plain data
// that can be printed or serialized to JSON.
// =============================================================================

use crate::github::RepoRef;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Why a file or folder didn't make it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Downloading the bytes failed (after retries)
    Fetch,
    /// Writing the bytes locally failed
    LocalWrite,
    /// Listing a subfolder failed; nothing below it was synced
    Listing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: String,
    pub kind: FailureKind,
    pub message: String,
}

/// An entry we don't know how to mirror (submodule, symlink, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsupportedEntry {
    pub path: String,
    /// The type the remote reported for it
    pub kind: String,
}

/// Live state of one sync run.
#[derive(Debug)]
pub struct SyncSession {
    root: RepoRef,
    recursive: bool,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    planned: AtomicUsize,
    folders_not_followed: AtomicUsize,
    interrupted: AtomicBool,
    failures: Mutex<Vec<Failure>>,
    aborted_subtrees: Mutex<Vec<Failure>>,
    unsupported: Mutex<Vec<UnsupportedEntry>>,
}

impl SyncSession {
    pub fn new(root: RepoRef, recursive: bool) -> Self {
        Self {
            root,
            recursive,
            downloaded: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            planned: AtomicUsize::new(0),
            folders_not_followed: AtomicUsize::new(0),
            interrupted: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
            aborted_subtrees: Mutex::new(Vec::new()),
            unsupported: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &RepoRef {
        &self.root
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn record_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_planned(&self) {
        self.planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_folder_not_followed(&self) {
        self.folders_not_followed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_interrupted(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn record_failure(&self, path: &str, kind: FailureKind, message: impl Into<String>) {
        push(
            &self.failures,
            Failure {
                path: path.to_string(),
                kind,
                message: message.into(),
            },
        );
    }

    pub fn record_aborted_subtree(&self, path: &str, message: impl Into<String>) {
        push(
            &self.aborted_subtrees,
            Failure {
                path: path.to_string(),
                kind: FailureKind::Listing,
                message: message.into(),
            },
        );
    }

    pub fn record_unsupported(&self, path: &str, kind: &str) {
        push(
            &self.unsupported,
            UnsupportedEntry {
                path: path.to_string(),
                kind: kind.to_string(),
            },
        );
    }

    pub fn into_report(self) -> SyncReport {
        let mut failures = take(self.failures);
        let mut aborted_subtrees = take(self.aborted_subtrees);
        let mut unsupported = take(self.unsupported);

        // Tasks finish in any order; sort so reports are stable
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        aborted_subtrees.sort_by(|a, b| a.path.cmp(&b.path));
        unsupported.sort_by(|a, b| a.path.cmp(&b.path));

        SyncReport {
            root: self.root.to_string(),
            recursive: self.recursive,
            downloaded: self.downloaded.into_inner(),
            skipped: self.skipped.into_inner(),
            planned: self.planned.into_inner(),
            folders_not_followed: self.folders_not_followed.into_inner(),
            interrupted: self.interrupted.into_inner(),
            failures,
            aborted_subtrees,
            unsupported,
        }
    }
}

fn push<T>(list: &Mutex<Vec<T>>, item: T) {
    list.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(item);
}

fn take<T>(list: Mutex<Vec<T>>) -> Vec<T> {
    list.into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Summary of a finished sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub root: String,
    pub recursive: bool,
    /// Files fetched, written, and recorded during this run
    pub downloaded: usize,
    /// Files whose stored content hash matched the remote one
    pub skipped: usize,
    /// Files a dry run would have downloaded
    pub planned: usize,
    /// Subfolders seen but not entered because recursion was off
    pub folders_not_followed: usize,
    /// A stop was requested before the whole tree was visited
    pub interrupted: bool,
    pub failures: Vec<Failure>,
    pub aborted_subtrees: Vec<Failure>,
    pub unsupported: Vec<UnsupportedEntry>,
}

impl SyncReport {
    /// Files that could not be fetched or written.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when nothing failed and the whole tree was visited.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.aborted_subtrees.is_empty() && !self.interrupted
    }
}
