// src/sync/engine.rs
// =============================================================================
// The sync engine: walks a remote folder and mirrors it locally.
//
// For each folder level:
// 1. List the folder's children
// 2. For each file, look up its path in the store
//    - same content hash as last time -> skip, no download
//    - different hash or never seen   -> download, write, then record
// 3. Submodules/symlinks are noted as unsupported and skipped
// 4. Subfolders are entered only in recursive mode
//
// Failure scopes:
// - one file failing to download or write is recorded, siblings carry on
// - a subfolder failing to list is recorded, the rest of the tree carries on
// - the top folder failing to list, or the store failing, ends the session
//
// Retries:
// - a download is retried as a whole (fetch + write) when the fetch side
//   fails with a retryable error, including a body that breaks mid-stream
// - a local write error is not retried
//
// Concurrency:
// - files in one folder are processed with buffer_unordered
// - sibling subfolders are walked concurrently the same way
// - a semaphore caps in-flight requests (listings and downloads) across
//   the whole session, since nested fan-out would otherwise multiply the
//   limit at every level. A listing holds its permit only for the request,
//   never while its subfolders are walked.
// =============================================================================

use super::session::{FailureKind, SyncReport, SyncSession};
use super::writer::LocalWriter;
use crate::error::{FileError, SyncError};
use crate::github::{
    EntryKind, FileFetcher, RemoteEntry, RemoteTreeClient, RepoRef, RetryDecision, RetryPolicy,
};
use crate::store::ContentIdentifierStore;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Default cap on concurrent downloads.
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Descend into subfolders
    pub recursive: bool,
    /// Max requests in flight at once (values below 1 are treated as 1)
    pub concurrency: usize,
    /// Decide what to download but don't fetch, write, or record anything
    pub dry_run: bool,
    /// How often a failed download is attempted again
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Asks a running sync to stop before it lists any more folders.
///
/// Downloads already in flight finish and are recorded normally.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct SyncEngine {
    tree: Arc<dyn RemoteTreeClient>,
    fetcher: Arc<dyn FileFetcher>,
    store: Arc<dyn ContentIdentifierStore>,
    writer: LocalWriter,
    options: SyncOptions,
    permits: Semaphore,
    stop: StopHandle,
}

impl SyncEngine {
    /// `output` is the folder the remote tree is mirrored into.
    pub fn new(
        tree: Arc<dyn RemoteTreeClient>,
        fetcher: Arc<dyn FileFetcher>,
        store: Arc<dyn ContentIdentifierStore>,
        output: impl Into<PathBuf>,
        options: SyncOptions,
    ) -> Self {
        let options = SyncOptions {
            concurrency: options.concurrency.max(1),
            ..options
        };

        Self {
            tree,
            fetcher,
            store,
            writer: LocalWriter::new(output),
            options,
            permits: Semaphore::new(options.concurrency),
            stop: StopHandle::default(),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Parses a GitHub folder URL and syncs it.
    ///
    /// A malformed URL fails here, before any network call.
    pub async fn download_folder(&self, url: &str) -> Result<SyncReport, SyncError> {
        let reference = RepoRef::parse(url)?;
        self.sync(&reference).await
    }

    /// Syncs one remote folder (and its subfolders in recursive mode).
    ///
    /// Returns the run's report; `report.downloaded` counts only files that
    /// were fetched, written, and recorded during this call.
    pub async fn sync(&self, reference: &RepoRef) -> Result<SyncReport, SyncError> {
        let session = SyncSession::new(reference.clone(), self.options.recursive);

        info!(
            root = %reference,
            recursive = self.options.recursive,
            dry_run = self.options.dry_run,
            "starting sync"
        );

        if let Err(err) = self.sync_directory(&session, String::new()).await {
            error!(root = %reference, error = %err, "sync aborted");
            return Err(err);
        }

        let report = session.into_report();
        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed(),
            unsupported = report.unsupported.len(),
            aborted_subtrees = report.aborted_subtrees.len(),
            "sync finished"
        );
        Ok(report)
    }

    // Syncs one folder level, then (if recursive) its subfolders.
    //
    // Boxed because it calls itself; an async fn can't be recursive directly.
    fn sync_directory<'a>(
        &'a self,
        session: &'a SyncSession,
        dir: String,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        async move {
            if self.stop.is_stop_requested() {
                debug!(dir = %dir, "stop requested, not listing");
                session.mark_interrupted();
                return Ok(());
            }

            let listed = {
                // The semaphore is never closed, so acquire can't fail
                let _permit = self.permits.acquire().await.ok();
                self.tree.list_children(session.root(), &dir).await
            };
            let entries = listed.map_err(|source| SyncError::Listing {
                path: display_path(session.root(), &dir),
                source,
            })?;

            debug!(dir = %dir, entries = entries.len(), "listed folder");

            let mut files = Vec::new();
            let mut folders = Vec::new();
            for entry in entries {
                if let EntryKind::Unsupported(kind) = &entry.kind {
                    info!(path = %entry.path, kind = %kind, "skipping unsupported entry");
                    session.record_unsupported(&entry.path, kind);
                } else if entry.is_file() {
                    files.push(entry);
                } else {
                    folders.push(entry);
                }
            }

            let results: Vec<Result<(), SyncError>> = stream::iter(files)
                .map(|entry| self.sync_file(session, entry))
                .buffer_unordered(self.options.concurrency)
                .collect()
                .await;

            // Only session-fatal errors come back as Err here
            for result in results {
                result?;
            }

            if !session.recursive() {
                for folder in &folders {
                    debug!(path = %folder.path, "not recursive, skipping folder");
                    session.record_folder_not_followed();
                }
                return Ok(());
            }

            let outcomes: Vec<(String, Result<(), SyncError>)> = stream::iter(folders)
                .map(|folder| async move {
                    let result = self.sync_directory(session, folder.path.clone()).await;
                    (folder.path, result)
                })
                .buffer_unordered(self.options.concurrency)
                .collect()
                .await;

            for (path, result) in outcomes {
                match result {
                    Ok(()) => {}
                    // A subfolder that can't be listed only loses its own subtree
                    Err(SyncError::Listing { path: listed, source }) => {
                        error!(path = %path, error = %source, "failed to list folder, skipping subtree");
                        session.record_aborted_subtree(&listed, source.to_string());
                    }
                    Err(fatal) => return Err(fatal),
                }
            }

            Ok(())
        }
        .boxed()
    }

    async fn sync_file(&self, session: &SyncSession, entry: RemoteEntry) -> Result<(), SyncError> {
        match self.store.lookup(&entry.path).await? {
            Some(tracked) if tracked.content_id == entry.content_id => {
                debug!(path = %entry.path, content_id = %entry.content_id, "unchanged, skipping");
                session.record_skipped();
                return Ok(());
            }
            Some(tracked) => debug!(
                path = %entry.path,
                old = %tracked.content_id,
                new = %entry.content_id,
                "content changed"
            ),
            None => debug!(path = %entry.path, "no record, will download"),
        }

        if self.options.dry_run {
            info!(path = %entry.path, content_id = %entry.content_id, "would download");
            session.record_planned();
            return Ok(());
        }

        let written = {
            // The semaphore is never closed, so acquire can't fail
            let _permit = self.permits.acquire().await.ok();
            info!(path = %entry.path, "downloading");

            match self.download_with_retry(&entry).await {
                Ok(written) => written,
                Err(err) => {
                    let kind = match &err {
                        FileError::Fetch(_) => FailureKind::Fetch,
                        FileError::Write(_) => FailureKind::LocalWrite,
                    };
                    error!(path = %entry.path, error = %err, "failed to download file");
                    session.record_failure(&entry.path, kind, err.to_string());
                    return Ok(());
                }
            }
        };

        // The bytes are in place; only now may the store say so
        self.store
            .upsert(&entry.path, &entry.content_id, written)
            .await?;
        session.record_downloaded();
        info!(path = %entry.path, bytes = written, content_id = %entry.content_id, "downloaded");

        Ok(())
    }

    async fn download(&self, entry: &RemoteEntry) -> Result<u64, FileError> {
        let body = self.fetcher.fetch(entry).await?;
        self.writer.write_stream(&entry.path, body).await
    }

    // A failed attempt leaves nothing behind (the writer drops its staging
    // file), so each retry starts from scratch
    async fn download_with_retry(&self, entry: &RemoteEntry) -> Result<u64, FileError> {
        let mut state = self.options.retry.start();

        loop {
            let err = match self.download(entry).await {
                Ok(written) => return Ok(written),
                Err(FileError::Fetch(err)) => err,
                Err(write_err) => return Err(write_err),
            };

            match state.on_failure(&err) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        path = %entry.path,
                        attempt = state.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(FileError::Fetch(err)),
            }
        }
    }
}

fn display_path(root: &RepoRef, dir: &str) -> String {
    let path = root.repo_path(dir);
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}
