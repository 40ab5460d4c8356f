//! Core data models for the media indexer

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ScanError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Snapshot of one discovered file at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute, normalized path; unique key within an index
    pub path: PathBuf,
    /// File name without directory
    pub name: String,
    /// File extension (lowercase, without dot)
    pub extension: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Modification time as Unix timestamp (seconds)
    pub modified_at: i64,
    /// Best-effort creation time as Unix timestamp (seconds).
    ///
    /// Platforms without a birth time substitute the modification time, and the
    /// value is never later than `modified_at`.
    pub created_at: i64,
    /// Directory containing the file
    pub parent_folder: PathBuf,
}

impl MediaFile {
    /// Create a new MediaFile, deriving name, extension and parent folder from `path`
    pub fn new(path: PathBuf, size_bytes: u64, modified_at: i64, created_at: i64) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&path);
        let parent_folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            name,
            extension,
            size_bytes,
            modified_at,
            created_at: created_at.min(modified_at),
            parent_folder,
        }
    }

    /// Size in megabytes (1024²)
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    /// Size in gigabytes (1024³)
    pub fn size_gb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_GB
    }

    /// Index key for this file; None when the path is not valid UTF-8
    pub fn key(&self) -> Option<&str> {
        self.path.to_str()
    }
}

/// Lowercased extension of `path` without the leading dot, empty if none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Outcome of one traversal.
///
/// The file list and its aggregates are only mutated through [`ScanResult::push_file`],
/// so `file_count` and `total_size_bytes` always agree with `files`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    root_path: PathBuf,
    file_count: usize,
    total_size_bytes: u64,
    /// Unix timestamp (seconds) at which the scan started
    pub scan_timestamp: i64,
    /// Extensions the scan filtered on, sorted
    pub extensions_scanned: Vec<String>,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
    /// Entries that could not be read
    pub errors: Vec<ScanError>,
    files: Vec<MediaFile>,
}

impl ScanResult {
    /// Create an empty result for `root_path`
    pub fn new(root_path: PathBuf, scan_timestamp: i64) -> Self {
        Self {
            root_path,
            file_count: 0,
            total_size_bytes: 0,
            scan_timestamp,
            extensions_scanned: Vec::new(),
            duration_ms: 0,
            errors: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Append a file, keeping the aggregates consistent
    pub fn push_file(&mut self, file: MediaFile) {
        self.total_size_bytes += file.size_bytes;
        self.files.push(file);
        self.file_count = self.files.len();
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Files in traversal order
    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<MediaFile> {
        self.files
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn total_size_gb(&self) -> f64 {
        self.total_size_bytes as f64 / BYTES_PER_GB
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the scan completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
