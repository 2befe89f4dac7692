// src/sync/writer.rs
// =============================================================================
// Writes downloaded files under the output root, mirroring remote paths.
//
// Bytes go to a staging file in the target's folder and are renamed into
// place once complete, so a crash or a dropped connection never leaves a
// truncated file at the real path.
//
// The staging file is created with a random name and O_EXCL (tempfile),
// so it can never open an existing file, even one the remote folder
// happens to name like a staging file. If anything fails before the
// rename, dropping the TempPath deletes it.
// =============================================================================

use crate::error::{FileError, WriteError};
use crate::github::ByteStream;
use futures::StreamExt;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct LocalWriter {
    root: PathBuf,
}

impl LocalWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a remote relative path to its local location under the root.
    ///
    /// Absolute paths and `..` components are rejected so a listing can
    /// never make us write outside the output directory.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, WriteError> {
        let candidate = Path::new(relative);
        let safe = !relative.is_empty()
            && candidate
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(WriteError {
                path: self.root.join(relative),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path escapes the output directory",
                ),
            });
        }
        Ok(self.root.join(candidate))
    }

    /// Streams `body` to `relative` and returns the number of bytes written.
    pub async fn write_stream(&self, relative: &str, body: ByteStream) -> Result<u64, FileError> {
        let target = self.resolve(relative)?;
        write_to(&target, body).await
    }
}

async fn write_to(target: &Path, mut body: ByteStream) -> Result<u64, FileError> {
    let io_error = |source: io::Error| WriteError {
        path: target.to_path_buf(),
        source,
    };

    // resolve() never returns the bare root, so there is always a parent
    let parent = target
        .parent()
        .ok_or_else(|| io_error(io::Error::new(io::ErrorKind::InvalidInput, "no parent folder")))?;

    // create_dir_all tolerates another task creating the same parent at
    // the same moment, so sibling downloads can all call it
    fs::create_dir_all(parent).await.map_err(io_error)?;

    let staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(io_error)?;
    let (std_file, temp) = staged.into_parts();
    let mut file = fs::File::from_std(std_file);
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(io_error)?;
    file.sync_all().await.map_err(io_error)?;
    drop(file);

    temp.persist(target).map_err(|e| io_error(e.error))?;
    Ok(written)
}
