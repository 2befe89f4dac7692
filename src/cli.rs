// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Usage:
//   gh-folder-sync https://github.com/owner/repo/tree/main/some/folder -r -o ./output
// =============================================================================

use clap::Parser;
use gh_folder_sync::config::{SyncConfig, DEFAULT_API_BASE, DEFAULT_OUTPUT};
use gh_folder_sync::github::RetryPolicy;
use std::path::PathBuf;

// This struct represents our entire CLI application
//
// There are no subcommands: the tool does one thing, so the URL is the
// first positional argument and everything else is a flag.
#[derive(Parser, Debug)]
#[command(
    name = "gh-folder-sync",
    version,
    about = "Download a folder from a GitHub repository, skipping files that haven't changed",
    long_about = "gh-folder-sync mirrors a folder of a public GitHub repository into a local \
                  directory. A SQLite database records the content hash of every downloaded \
                  file, so running it again only fetches files that changed.\n\n\
                  Example folder URL:\n  \
                  https://github.com/aws/aws-sdk-js-v3/tree/main/codegen/sdk-codegen/aws-models"
)]
pub struct Cli {
    /// GitHub folder URL (e.g., https://github.com/user/repo/tree/main/docs)
    pub url: String,

    /// Download files from subfolders too, keeping the folder structure
    #[arg(short, long)]
    pub recursive: bool,

    /// Output directory (files/, database/ and logs/ are created inside it)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// GitHub token, sent as a bearer token (raises the API rate limit)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API base URL (for GitHub Enterprise)
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE)]
    pub api_url: String,

    /// Maximum number of files downloaded at the same time
    #[arg(short = 'j', long, default_value_t = 8,
          value_parser = clap::value_parser!(u32).range(1..=64))]
    pub concurrency: u32,

    /// How many times to retry a request after a rate limit or network error
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Show what would be downloaded without downloading anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn to_config(&self) -> SyncConfig {
        SyncConfig {
            output_root: self.output.clone(),
            recursive: self.recursive,
            debug: self.debug,
            concurrency: self.concurrency as usize,
            retry: RetryPolicy::default().with_max_retries(self.max_retries),
            token: self.token.clone().filter(|t| !t.trim().is_empty()),
            api_base: self.api_url.clone(),
            dry_run: self.dry_run,
        }
    }
}
