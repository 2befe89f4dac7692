// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (console + per-run log files)
// 3. Open the hash database and build the GitHub client
// 4. Run the sync engine and print a summary
// 5. Exit with proper code (0 = success, 1 = some files failed, 2 = error)
// =============================================================================

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use gh_folder_sync::store::ContentIdentifierStore;
use gh_folder_sync::sync::FailureKind;
use gh_folder_sync::{GithubClient, RepoRef, SqliteStore, SyncEngine, SyncReport};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = everything synced (or was already up to date)
//   Ok(1) = the run finished but some files or folders failed
//   Err   = fatal error (bad URL, folder not found, database failure, ...)
async fn run(cli: Cli) -> Result<i32> {
    let config = cli.to_config();
    let layout = config.layout();

    let logs = logging::init(&layout.logs_dir(), config.debug)?;
    debug!(
        execution_log = %logs.execution_log.display(),
        error_log = %logs.error_log.display(),
        "logging initialized"
    );

    // Resolve the URL before touching the network or the database
    let reference = match RepoRef::parse(&cli.url) {
        Ok(reference) => reference,
        Err(e) => {
            error!(url = %cli.url, error = %e, "invalid folder URL");
            return Err(e.into());
        }
    };
    info!(
        owner = %reference.owner,
        repo = %reference.repo,
        branch = %reference.branch,
        path = %reference.path,
        "processing repository"
    );

    layout.prepare().map_err(log_fatal("preparing output directory"))?;
    let store = Arc::new(
        SqliteStore::open(&layout.database_path()).map_err(log_fatal("opening database"))?,
    );
    let client = Arc::new(
        GithubClient::new(&config.api_base, config.token.clone(), config.retry)
            .map_err(log_fatal("creating GitHub client"))
            .context("failed to create GitHub client")?,
    );

    let engine = SyncEngine::new(
        client.clone(),
        client,
        store.clone(),
        layout.files_dir(),
        config.sync_options(),
    );

    // Ctrl-C: let in-flight downloads finish, don't start new folders
    let stop = engine.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested, finishing downloads in progress");
            stop.request_stop();
        }
    });

    let outcome = engine.sync(&reference).await;
    let closed = store.close().await;

    let report = outcome?;
    closed
        .map_err(log_fatal("closing database"))
        .context("failed to close the database")?;

    print_report(&report, cli.json)?;

    Ok(if report.is_clean() { 0 } else { 1 })
}

// Records a setup failure as an ERROR event (so it reaches error_<ts>.log)
// and hands the error back unchanged for `?`
fn log_fatal<E: std::fmt::Display>(step: &'static str) -> impl FnOnce(E) -> E {
    move |e| {
        error!(step, error = %e, "fatal error");
        e
    }
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for failure in &report.failures {
        let label = match failure.kind {
            FailureKind::Fetch => "download failed",
            FailureKind::LocalWrite => "write failed",
            FailureKind::Listing => "listing failed",
        };
        println!("❌ {}: {} ({})", failure.path, label, failure.message);
    }
    for subtree in &report.aborted_subtrees {
        println!("❌ {}/: folder skipped ({})", subtree.path, subtree.message);
    }
    for entry in &report.unsupported {
        println!("⏭️  {}: unsupported entry type '{}'", entry.path, entry.kind);
    }

    if report.planned > 0 {
        println!("📝 {} file(s) would be downloaded (dry run)", report.planned);
    } else if report.downloaded == 0 {
        println!("No new files downloaded.");
    } else {
        println!("Successfully downloaded {} files.", report.downloaded);
    }

    println!();
    println!("📊 Summary:");
    println!("   ⬇️  Downloaded: {}", report.downloaded);
    println!("   ✅ Unchanged: {}", report.skipped);
    println!("   ❌ Failed: {}", report.failed());
    println!("   ⏭️  Unsupported: {}", report.unsupported.len());
    if report.interrupted {
        println!("   ⚠️  Interrupted before the whole tree was visited");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_folder_sync::OutputLayout;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_setup_failure_is_logged_as_error() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the output directory should go
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let layout = OutputLayout::new(&blocker);

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            layout
                .prepare()
                .map_err(log_fatal("preparing output directory"))
        });

        assert!(result.is_err());
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("ERROR"));
        assert!(logged.contains("preparing output directory"));
    }
}
