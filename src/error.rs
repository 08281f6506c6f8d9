//! Error types for source emission and write-back
//!
//! Library surfaces return these typed errors; the mirror driver and the
//! binary wrap them in `anyhow` with context at the application edge.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for write-back operations
pub type WriteBackResult<T> = Result<T, WriteBackError>;

/// Errors raised by [`EmitBuffer`](crate::codegen::EmitBuffer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmitError {
    /// `end_block` was called with no open block
    #[error("end_block called at indent level 0 without a matching begin_block")]
    IndentUnderflow,
}

/// A checkout collaborator refused or failed to make a path writable
#[derive(Debug, Error)]
#[error("checkout of {path:?} failed: {reason}")]
pub struct CheckoutError {
    pub path: PathBuf,
    pub reason: String,
}

impl CheckoutError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Write-back failures
///
/// Every variant propagates to the immediate caller. None of them are retried
/// and none leave a partially checked-out file behind: a checkout failure
/// always happens before the destination is opened for writing.
#[derive(Debug, Error)]
pub enum WriteBackError {
    /// Destination path was empty; raised before any file-system access
    #[error("destination path must not be empty")]
    InvalidDestination,

    /// Destination exists but could not be read for comparison
    #[error("failed to read existing file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("failed to create parent directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriteBackError {
    /// True for caller errors detected before touching the file system
    pub fn is_precondition(&self) -> bool {
        matches!(self, WriteBackError::InvalidDestination)
    }

    /// Path the failure relates to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            WriteBackError::InvalidDestination => None,
            WriteBackError::Read { path, .. }
            | WriteBackError::CreateDir { path, .. }
            | WriteBackError::Write { path, .. } => Some(path),
            WriteBackError::Checkout(err) => Some(&err.path),
        }
    }
}
