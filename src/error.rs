//! Error taxonomy for the engine.
//!
//! Per-file and per-block failures during batch operations are accumulated
//! as [`Warning`]s alongside partial results; single-item operations
//! propagate [`Error`] directly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Errors surfaced by single-item operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure reading one file. Batch operations downgrade this to a
    /// warning and skip the file.
    #[error("file unreadable: {path}: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The structural parser rejected the file. Extraction falls back to
    /// the lexical path; this only escapes when both paths fail.
    #[error("parse failed for {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    /// Malformed regex or query input; fails the single call, not the engine.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// The index store was used before `initialize`.
    #[error("index store is not initialized")]
    NotInitialized,

    /// An upsert could not complete atomically. The codebase's index is
    /// left in its prior, consistent state.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong for one item of a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    FileUnreadable,
    ParseFailed,
}

/// A non-fatal per-item failure reported alongside partial results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub file_path: PathBuf,
    pub message: String,
}

impl Warning {
    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::FileUnreadable,
            file_path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ParseFailed,
            file_path: path.into(),
            message: message.into(),
        }
    }
}
