//! Error types for the media indexer

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced to callers of the scanner and the indexer
#[derive(Debug, Error)]
pub enum Error {
    /// Path or file is absent (or is not the kind of entry the operation needs)
    #[error("{reason}: {}", path.display())]
    NotFound { path: PathBuf, reason: &'static str },

    /// Scan root exists but is not a directory
    #[error("Path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Caller supplied arguments that cannot be satisfied
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading or writing persisted state failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored index does not match the expected schema
    #[error("Index is corrupt ({}): {reason}", path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    /// Scan was aborted through its cancel flag
    #[error("Scan cancelled")]
    Cancelled,

    /// Filesystem observer failed to start or register a path
    #[cfg(feature = "watch")]
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            path: path.into(),
            reason: "Path does not exist",
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Kinds of per-file failure recorded during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// Entry vanished between listing and stat
    NotFound,
    /// Any other I/O failure
    IoError,
    /// Error without an underlying I/O cause
    Unknown,
}

/// A file or directory that could not be read during a scan.
///
/// These never abort a scan; they are collected into [`crate::ScanResult::errors`].
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: PathBuf,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Classify an I/O error raised while reading `path`
    pub fn from_io(path: &Path, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(
            kind,
            path.to_path_buf(),
            format!("Error reading {}: {}", path.display(), err),
        )
    }

    /// Convert a walkdir traversal error
    pub fn from_walk(err: &walkdir::Error, fallback: &Path) -> Self {
        let path = err.path().unwrap_or(fallback);
        match err.io_error() {
            Some(io) => Self::from_io(path, io),
            None => Self::new(ScanErrorKind::Unknown, path.to_path_buf(), err.to_string()),
        }
    }
}
