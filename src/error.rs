//! Error types for the build pipeline and the lookup path.
//!
//! Library code returns [`SkudexError`]; the binary wraps it in
//! `anyhow::Result` for convenience.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using [`SkudexError`].
pub type Result<T> = std::result::Result<T, SkudexError>;

#[derive(Error, Debug)]
pub enum SkudexError {
    /// Read, write, seek or delete failure.
    #[error("I/O error while trying to {operation} {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A data line has the wrong field count or a non-numeric rank.
    #[error("malformed record {line:?}: {detail}")]
    MalformedRecord { line: String, detail: String },

    /// An index line could not be parsed.
    #[error("malformed index line {line_number}: {detail}")]
    MalformedIndex { line_number: usize, detail: String },

    /// The stored record width does not match the data on disk.
    #[error("record width mismatch: {0}")]
    ConfigMismatch(String),

    /// The sorted file is not ordered by key, so key runs are not contiguous.
    #[error("key {key:?} at line {line} sorts before the preceding key run")]
    IndexBuildInvariant { key: String, line: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SkudexError {
    pub fn io(path: impl AsRef<Path>, operation: &'static str, source: std::io::Error) -> Self {
        SkudexError::Io {
            path: path.as_ref().to_path_buf(),
            operation,
            source,
        }
    }

    pub fn malformed_record(line: impl Into<String>, detail: impl Into<String>) -> Self {
        SkudexError::MalformedRecord {
            line: line.into(),
            detail: detail.into(),
        }
    }

    pub fn malformed_index(line_number: usize, detail: impl Into<String>) -> Self {
        SkudexError::MalformedIndex {
            line_number,
            detail: detail.into(),
        }
    }

    pub fn config_mismatch(msg: impl Into<String>) -> Self {
        SkudexError::ConfigMismatch(msg.into())
    }
}

/// Attaches a path and operation to `std::io::Result` values.
pub(crate) trait IoContext<T> {
    fn io_context(self, path: &Path, operation: &'static str) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, path: &Path, operation: &'static str) -> Result<T> {
        self.map_err(|e| SkudexError::io(path, operation, e))
    }
}
