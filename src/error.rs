use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors raised by the benchmark harness and its suites.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Caller-supplied parameters are structurally impossible. Raised before any timed work.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An external utility exited with a non-zero status.
    #[error("{tool} exited with {status}: {stderr}")]
    ToolInvocationFailure {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Dropping the OS page cache was refused.
    #[error("cache flush denied: {0}")]
    CacheFlushDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl BenchError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        BenchError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;

/// Failure modes of [`crate::cache::flush_os_cache`].
#[derive(Error, Debug)]
pub enum FlushError {
    /// Forcing buffered writes to storage failed.
    #[error("sync failed: {0}")]
    Sync(#[source] io::Error),

    /// The privileged cache drop was refused; carries the OS diagnostic text.
    #[error("{diagnostic}")]
    Denied { diagnostic: String },
}

impl From<FlushError> for BenchError {
    fn from(e: FlushError) -> Self {
        match e {
            FlushError::Sync(io) => BenchError::Io(io),
            FlushError::Denied { diagnostic } => BenchError::CacheFlushDenied(diagnostic),
        }
    }
}
