// src/sync/mod.rs
// =============================================================================
// The synchronization core.
//
// Submodules:
// - engine: traversal, change detection, download dispatch
// - session: per-run counters and the final report
// - writer: puts downloaded bytes on disk under the output root
// =============================================================================

mod engine;
mod session;
mod writer;

pub use engine::{StopHandle, SyncEngine, SyncOptions, DEFAULT_CONCURRENCY};
pub use session::{Failure, FailureKind, SyncReport, SyncSession, UnsupportedEntry};
pub use writer::LocalWriter;
