//! Error types for culvert operations.
//!
//! Uses thiserror for derive macros. Every variant names the failure site so
//! the embedding caller can report it; this crate itself never prints.

use std::io;
use thiserror::Error;

/// Main error type for culvert operations.
///
/// Spawn failures mean no child process exists and nothing needs cleanup.
/// Exec failure inside a forked child is deliberately not represented here:
/// it is only observable in the child and surfaces as exit status
/// [`EXEC_FAILURE_CODE`](crate::process::EXEC_FAILURE_CODE) through `wait`.
#[derive(Error, Debug)]
pub enum CulvertError {
    /// Pipe or fork allocation failed before a child process existed.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Standalone pipe allocation failed.
    #[error("failed to create pipe: {source}")]
    Pipe {
        #[source]
        source: io::Error,
    },

    /// A blocking read on a pipe descriptor failed.
    #[error("pipe read failed: {source}")]
    Read {
        #[source]
        source: io::Error,
    },

    /// A blocking write on a pipe descriptor failed.
    #[error("pipe write failed: {source}")]
    Write {
        #[source]
        source: io::Error,
    },

    /// Reaping the child failed; no exit status was retrieved.
    #[error("wait on pid {pid} failed: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: io::Error,
    },

    /// Reading host input (standard input or a file) failed.
    #[error("failed to read {what}: {source}")]
    Input {
        what: String,
        #[source]
        source: io::Error,
    },
}

/// Result type alias for culvert operations.
pub type Result<T> = std::result::Result<T, CulvertError>;
