// src/config.rs
// =============================================================================
// Run configuration and the on-disk layout of the output directory.
//
// Layout under the output root (default ./output):
//   files/              the mirrored folder tree
//   database/files.db   path -> content hash records
//   logs/               execution_<timestamp>.log and error_<timestamp>.log
// =============================================================================

use crate::error::SyncError;
use crate::github::RetryPolicy;
use crate::sync::{SyncOptions, DEFAULT_CONCURRENCY};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_OUTPUT: &str = "./output";

/// Where everything lives under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    pub fn database_dir(&self) -> PathBuf {
        self.root.join("database")
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("files.db")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Creates the files and database directories if they're missing.
    pub fn prepare(&self) -> Result<(), SyncError> {
        for dir in [self.files_dir(), self.database_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| SyncError::Setup {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Everything one run needs to know, gathered from the command line.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub output_root: PathBuf,
    pub recursive: bool,
    pub debug: bool,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Passed through to GitHub as a bearer token
    pub token: Option<String>,
    pub api_base: String,
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT),
            recursive: false,
            debug: false,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            dry_run: false,
        }
    }
}

impl SyncConfig {
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_root)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            recursive: self.recursive,
            concurrency: self.concurrency,
            dry_run: self.dry_run,
            retry: self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/data/out");
        assert_eq!(layout.files_dir(), PathBuf::from("/data/out/files"));
        assert_eq!(layout.database_path(), PathBuf::from("/data/out/database/files.db"));
        assert_eq!(layout.logs_dir(), PathBuf::from("/data/out/logs"));
    }

    #[test]
    fn test_prepare_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.prepare().unwrap();
        layout.prepare().unwrap();

        assert!(layout.files_dir().is_dir());
        assert!(layout.database_dir().is_dir());
    }

    #[test]
    fn test_sync_options_follow_config() {
        let config = SyncConfig {
            recursive: true,
            concurrency: 3,
            dry_run: true,
            retry: RetryPolicy::none(),
            ..SyncConfig::default()
        };
        let options = config.sync_options();
        assert!(options.recursive);
        assert_eq!(options.concurrency, 3);
        assert!(options.dry_run);
        assert_eq!(options.retry.max_retries, 0);
    }
}
