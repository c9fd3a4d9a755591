//! Error types for treepack
//!
//! Two kinds of failure flow through a run:
//! - `PackError`: structural failures that abort the run (unreadable root,
//!   unusable output stream, thread failures, invalid configuration)
//! - `SkipReason`: per-file outcomes that are recorded in the document and
//!   the ledger but never abort anything

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for a pack run
#[derive(Error, Debug)]
pub enum PackError {
    /// Root directory could not be resolved, opened or read
    #[error("cannot {op} '{}': {source}", .path.display())]
    FileSystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Output stream could not be created or written
    #[error("failed to {op} output: {source}")]
    Output {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// An entry could not be encoded for the target format
    #[error("failed to encode entry '{path}': {reason}")]
    Serialize { path: String, reason: String },

    /// Collection or document processing failed as a whole
    #[error("processing error: {0}")]
    Processing(String),

    /// Rejected before the pipeline started
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// A pipeline thread could not be started
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },

    /// Worker panicked
    #[error("worker {id} panicked")]
    WorkerPanicked { id: usize },

    /// Writer panicked
    #[error("writer thread panicked")]
    WriterPanicked,

    /// Run was cancelled before all files were written
    #[error("run cancelled after {written} of {dispatched} dispatched files were written")]
    Cancelled { dispatched: usize, written: usize },
}

impl PackError {
    pub(crate) fn fs(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PackError::FileSystem {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn output(op: &'static str, source: io::Error) -> Self {
        PackError::Output { op, source }
    }

    /// Returns true if this error is the result of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PackError::Cancelled { .. })
    }
}

/// Configuration errors detected before any file is touched
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Format name is not one of the supported formats
    #[error("unknown format '{0}': expected one of json, yaml, markdown")]
    UnknownFormat(String),

    /// Concurrency request above the supported maximum
    #[error("invalid concurrency {count}: must be between 1 and {max}")]
    Concurrency { count: usize, max: usize },

    /// Ignore pattern is not a valid glob
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    Glob { pattern: String, reason: String },

    /// Size string could not be parsed
    #[error("invalid size '{input}': {reason}")]
    Size { input: String, reason: String },

    /// Configuration file could not be loaded
    #[error("cannot load config '{}': {reason}", .path.display())]
    ConfigFile { path: PathBuf, reason: String },
}

/// Result type alias for PackError
pub type Result<T> = std::result::Result<T, PackError>;

/// Why a collected file was recorded without content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// File vanished between collection and read
    NotFound,
    /// Permission denied
    PermissionDenied,
    /// File exceeds the configured maximum size
    TooLarge { size: u64, limit: u64 },
    /// File looks like binary data
    Binary,
    /// File is not valid UTF-8 text
    InvalidUtf8,
    /// Any other read failure
    Io { message: String },
}

impl SkipReason {
    /// Classify an I/O error raised while reading a file
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SkipReason::NotFound,
            io::ErrorKind::PermissionDenied => SkipReason::PermissionDenied,
            io::ErrorKind::InvalidData => SkipReason::InvalidUtf8,
            _ => SkipReason::Io {
                message: err.to_string(),
            },
        }
    }

    /// Short stable name used for breakdowns
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::NotFound => "not_found",
            SkipReason::PermissionDenied => "permission_denied",
            SkipReason::TooLarge { .. } => "too_large",
            SkipReason::Binary => "binary",
            SkipReason::InvalidUtf8 => "invalid_utf8",
            SkipReason::Io { .. } => "io",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "file not found"),
            SkipReason::PermissionDenied => write!(f, "permission denied"),
            SkipReason::TooLarge { size, limit } => {
                write!(f, "file too large ({} bytes, limit {})", size, limit)
            }
            SkipReason::Binary => write!(f, "binary file"),
            SkipReason::InvalidUtf8 => write!(f, "not valid UTF-8"),
            SkipReason::Io { message } => write!(f, "read error: {}", message),
        }
    }
}
