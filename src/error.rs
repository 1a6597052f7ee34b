//! Error types for the telemetry pipeline.

use std::io;

/// Errors produced by the telemetry logger and its controllers.
///
/// Most faults inside the pipeline are absorbed locally (a failed flush drops
/// its batch, a failed archive pass retries next tick); this type covers the
/// operations that do surface errors to callers, such as opening the logger
/// or resolving an inspection request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be serialized or parsed.
    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Operation attempted on a writer that has been closed.
    #[error("{0} channel writer is closed")]
    WriterClosed(&'static str),

    /// A file name did not match the active-file pattern.
    #[error("invalid log file name: {0:?}")]
    InvalidFileName(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
