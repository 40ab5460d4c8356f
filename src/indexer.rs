//! Persistent file index
//!
//! The index maps absolute file paths to the last observed [`MediaFile`]. It is only
//! mutated in memory; [`Indexer::save`] and [`Indexer::load`] are the sole points of
//! disk I/O. The indexer does no locking: callers feeding it from several producers
//! must serialize `add_scan_result`/`save` themselves.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::models::{extension_of, MediaFile, ScanResult};
use crate::scanner::unix_now;

/// Version tag written into every saved index
pub const INDEX_VERSION: &str = "1";

/// One file as stored on disk; the path is the map key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexedFile {
    name: String,
    extension: String,
    size_bytes: u64,
    modified_at: i64,
    created_at: i64,
    parent_folder: String,
}

impl IndexedFile {
    fn from_media(file: &MediaFile) -> Self {
        Self {
            name: file.name.clone(),
            extension: file.extension.clone(),
            size_bytes: file.size_bytes,
            modified_at: file.modified_at,
            created_at: file.created_at,
            parent_folder: file.parent_folder.to_string_lossy().into_owned(),
        }
    }

    fn into_media(self, key: &str) -> std::result::Result<MediaFile, String> {
        let path = PathBuf::from(key);
        let parent = path.parent().unwrap_or(Path::new(""));
        if parent != Path::new(&self.parent_folder) {
            return Err(format!(
                "entry {:?} has parent_folder {:?}",
                key, self.parent_folder
            ));
        }
        if path.file_name().and_then(|n| n.to_str()) != Some(self.name.as_str()) {
            return Err(format!("entry {:?} has name {:?}", key, self.name));
        }
        if extension_of(&path) != self.extension {
            return Err(format!("entry {:?} has extension {:?}", key, self.extension));
        }
        Ok(MediaFile {
            parent_folder: PathBuf::from(self.parent_folder),
            path,
            name: self.name,
            extension: self.extension,
            size_bytes: self.size_bytes,
            modified_at: self.modified_at,
            created_at: self.created_at,
        })
    }
}

/// On-disk layout of the index
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexDocument {
    version: String,
    created_at: i64,
    last_updated_at: i64,
    source_roots: Vec<String>,
    files: BTreeMap<String, IndexedFile>,
}

/// Layout written before the index carried a version tag
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyDocument {
    updated_at: String,
    file_count: usize,
    files: BTreeMap<String, LegacyFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyFile {
    path: String,
    name: String,
    extension: String,
    size_bytes: u64,
    #[allow(dead_code)]
    size_mb: f64,
    modified_at: String,
    created_at: Option<String>,
    duration_seconds: Option<f64>,
}

/// In-memory index state
#[derive(Debug, Clone)]
struct Index {
    created_at: i64,
    last_updated_at: i64,
    source_roots: Vec<String>,
    files: BTreeMap<String, MediaFile>,
}

impl Index {
    fn empty() -> Self {
        let now = unix_now();
        Self {
            created_at: now,
            last_updated_at: now,
            source_roots: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    fn to_document(&self) -> IndexDocument {
        IndexDocument {
            version: INDEX_VERSION.to_string(),
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
            source_roots: self.source_roots.clone(),
            files: self
                .files
                .iter()
                .map(|(key, file)| (key.clone(), IndexedFile::from_media(file)))
                .collect(),
        }
    }

    fn from_document(doc: IndexDocument) -> std::result::Result<Self, String> {
        let mut files = BTreeMap::new();
        for (key, entry) in doc.files {
            let file = entry.into_media(&key)?;
            files.insert(key, file);
        }
        Ok(Self {
            created_at: doc.created_at,
            last_updated_at: doc.last_updated_at,
            source_roots: doc.source_roots,
            files,
        })
    }

    fn from_legacy(doc: LegacyDocument) -> std::result::Result<Self, String> {
        if doc.file_count != doc.files.len() {
            return Err(format!(
                "file_count is {} but {} files are present",
                doc.file_count,
                doc.files.len()
            ));
        }
        let updated_at = parse_iso_timestamp(&doc.updated_at)?;

        let mut files = BTreeMap::new();
        for (key, entry) in doc.files {
            if entry.path != key {
                return Err(format!("entry {:?} records path {:?}", key, entry.path));
            }
            if entry.duration_seconds.is_some() {
                return Err(format!(
                    "entry {:?} carries duration_seconds, which this index cannot store",
                    key
                ));
            }
            let modified_at = parse_iso_timestamp(&entry.modified_at)?;
            let created_at = match &entry.created_at {
                Some(ts) => parse_iso_timestamp(ts)?,
                None => modified_at,
            };
            let path = PathBuf::from(&key);
            let parent_folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
            files.insert(
                key,
                MediaFile {
                    path,
                    name: entry.name,
                    extension: entry.extension,
                    size_bytes: entry.size_bytes,
                    modified_at,
                    created_at,
                    parent_folder,
                },
            );
        }

        Ok(Self {
            created_at: updated_at,
            last_updated_at: updated_at,
            source_roots: Vec::new(),
            files,
        })
    }
}

/// ISO-8601 timestamp to Unix seconds; naive timestamps are taken as UTC
fn parse_iso_timestamp(value: &str) -> std::result::Result<i64, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| format!("invalid timestamp {:?}: {}", value, e))
}

/// Aggregate view of an index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub extension_counts: BTreeMap<String, usize>,
    pub created_at: i64,
    pub last_updated_at: i64,
    pub source_roots: Vec<String>,
    pub version: String,
    pub index_path: PathBuf,
}

impl IndexStats {
    pub fn total_size_gb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// File index bound to a storage path
#[derive(Debug, Clone)]
pub struct Indexer {
    path: PathBuf,
    index: Index,
}

impl Indexer {
    /// Create an empty index bound to `path`; nothing is read or written
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index: Index::empty(),
        }
    }

    /// Bind to `path` and load it if present, starting empty otherwise
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut indexer = Self::new(path);
        indexer.load_if_exists()?;
        Ok(indexer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace in-memory state with the stored index.
    ///
    /// Fails with [`Error::NotFound`] when nothing is stored yet and
    /// [`Error::IndexCorrupt`] when the content does not match the schema. In-memory
    /// state is untouched on failure.
    pub fn load(&mut self) -> Result<()> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound {
                path: self.path.clone(),
                reason: "Index file does not exist",
            },
            _ => Error::io(&self.path, e),
        })?;

        let index = self.parse(&content)?;
        log::info!(
            "Loaded index with {} files from {:?}",
            index.files.len(),
            self.path
        );
        self.index = index;
        Ok(())
    }

    /// Like [`Indexer::load`], but a missing file is `Ok(false)` rather than an error
    pub fn load_if_exists(&mut self) -> Result<bool> {
        match self.load() {
            Ok(()) => Ok(true),
            Err(Error::NotFound { .. }) => {
                log::debug!("Index file does not exist: {:?}", self.path);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn parse(&self, content: &str) -> Result<Index> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| Error::corrupt(&self.path, e.to_string()))?;

        let upgraded = match value.get("version") {
            Some(serde_json::Value::String(v)) if v == INDEX_VERSION => {
                let doc: IndexDocument = serde_json::from_value(value)
                    .map_err(|e| Error::corrupt(&self.path, e.to_string()))?;
                Index::from_document(doc)
            }
            Some(other) => {
                return Err(Error::corrupt(
                    &self.path,
                    format!("unsupported index version {}", other),
                ))
            }
            None => {
                let doc: LegacyDocument = serde_json::from_value(value)
                    .map_err(|e| Error::corrupt(&self.path, e.to_string()))?;
                log::info!("Upgrading unversioned index {:?}", self.path);
                Index::from_legacy(doc)
            }
        };

        upgraded.map_err(|reason| Error::corrupt(&self.path, reason))
    }

    /// Write the full index to the bound path.
    ///
    /// The document goes to a temporary file in the same directory which then
    /// replaces the target, so a failed save leaves the previous file intact.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let bytes = serde_json::to_vec_pretty(&self.index.to_document())
            .map_err(|e| Error::io(&self.path, io::Error::from(e)))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| Error::io(&dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::io(&self.path, e.error))?;

        log::info!(
            "Saved index with {} files to {:?}",
            self.index.files.len(),
            self.path
        );
        Ok(())
    }

    /// Add or replace one file.
    ///
    /// Paths that are not valid UTF-8 cannot be keyed and are rejected.
    pub fn add_file(&mut self, file: MediaFile) -> Result<()> {
        self.insert(file)?;
        self.touch();
        Ok(())
    }

    /// Merge every file of `result`, replacing entries with the same path.
    ///
    /// Returns the number of files merged. Files the index cannot key are logged and
    /// skipped.
    pub fn add_scan_result(&mut self, result: &ScanResult) -> usize {
        let mut merged = 0;
        for file in result.files() {
            match self.insert(file.clone()) {
                Ok(()) => merged += 1,
                Err(e) => log::warn!("Skipping {:?}: {}", file.path, e),
            }
        }

        let root = result.root_path().to_string_lossy().into_owned();
        if !self.index.source_roots.contains(&root) {
            self.index.source_roots.push(root);
        }
        self.touch();
        merged
    }

    fn insert(&mut self, file: MediaFile) -> Result<()> {
        let Some(key) = file.key().map(str::to_owned) else {
            return Err(Error::InvalidArgument(format!(
                "Path is not valid UTF-8: {}",
                file.path.display()
            )));
        };
        self.index.files.insert(key, file);
        Ok(())
    }

    /// Remove one entry; absent paths are a no-op
    pub fn remove_path(&mut self, path: impl AsRef<Path>) -> bool {
        let Some(key) = path.as_ref().to_str() else {
            return false;
        };
        let removed = self.index.files.remove(key).is_some();
        if removed {
            self.touch();
        }
        removed
    }

    /// Remove every entry below `folder` and forget source roots inside it.
    ///
    /// Returns the number of files removed.
    pub fn prune_under(&mut self, folder: impl AsRef<Path>) -> usize {
        let folder = folder.as_ref();
        let before = self.index.files.len();
        self.index
            .files
            .retain(|_, file| !file.path.starts_with(folder));
        let removed = before - self.index.files.len();

        let roots_before = self.index.source_roots.len();
        self.index
            .source_roots
            .retain(|root| !Path::new(root).starts_with(folder));

        if removed > 0 || roots_before != self.index.source_roots.len() {
            self.touch();
        }
        removed
    }

    /// Drop all entries and source roots
    pub fn clear(&mut self) {
        self.index.files.clear();
        self.index.source_roots.clear();
        self.touch();
        log::debug!("Index cleared");
    }

    pub fn get_file(&self, path: impl AsRef<Path>) -> Option<&MediaFile> {
        path.as_ref()
            .to_str()
            .and_then(|key| self.index.files.get(key))
    }

    pub fn has_file(&self, path: impl AsRef<Path>) -> bool {
        self.get_file(path).is_some()
    }

    /// All indexed files, ordered by path
    pub fn files(&self) -> impl Iterator<Item = &MediaFile> {
        self.index.files.values()
    }

    pub fn file_count(&self) -> usize {
        self.index.files.len()
    }

    /// Files whose parent folder is exactly `folder`
    pub fn get_files_in_folder(&self, folder: impl AsRef<Path>) -> Vec<MediaFile> {
        let folder = folder.as_ref();
        self.files()
            .filter(|f| f.parent_folder == folder)
            .cloned()
            .collect()
    }

    /// Files anywhere below `folder` (recursive variant of `get_files_in_folder`)
    pub fn get_files_under(&self, folder: impl AsRef<Path>) -> Vec<MediaFile> {
        let folder = folder.as_ref();
        self.files()
            .filter(|f| f.path.starts_with(folder) && f.path != folder)
            .cloned()
            .collect()
    }

    pub fn get_stats(&self) -> IndexStats {
        let mut extension_counts = BTreeMap::new();
        let mut total_size_bytes = 0;
        for file in self.files() {
            total_size_bytes += file.size_bytes;
            *extension_counts.entry(file.extension.clone()).or_insert(0) += 1;
        }

        IndexStats {
            file_count: self.file_count(),
            total_size_bytes,
            extension_counts,
            created_at: self.index.created_at,
            last_updated_at: self.index.last_updated_at,
            source_roots: self.index.source_roots.clone(),
            version: INDEX_VERSION.to_string(),
            index_path: self.path.clone(),
        }
    }

    fn touch(&mut self) {
        self.index.last_updated_at = unix_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;
    use std::fs::File;

    fn file(path: &str, size: u64) -> MediaFile {
        MediaFile::new(PathBuf::from(path), size, 1_700_000_000, 1_690_000_000)
    }

    fn scan_result(root: &str, files: Vec<MediaFile>) -> ScanResult {
        let mut result = ScanResult::new(PathBuf::from(root), 1_700_000_000);
        for f in files {
            result.push_file(f);
        }
        result
    }

    fn sample_result() -> ScanResult {
        scan_result(
            "/media",
            vec![
                file("/media/a.mkv", 600),
                file("/media/sub/c.mp4", 50),
                file("/media/sub/deeper/d.mp4", 7),
            ],
        )
    }

    fn snapshot(indexer: &Indexer) -> (Vec<MediaFile>, Vec<String>) {
        (
            indexer.files().cloned().collect(),
            indexer.get_stats().source_roots,
        )
    }

    #[test]
    fn test_add_scan_result() {
        let mut indexer = Indexer::new("/tmp/unused.json");
        assert_eq!(indexer.add_scan_result(&sample_result()), 3);

        assert_eq!(indexer.file_count(), 3);
        assert!(indexer.has_file("/media/a.mkv"));
        assert_eq!(indexer.get_stats().source_roots, vec!["/media"]);
    }

    #[test]
    fn test_add_scan_result_idempotent() {
        let result = sample_result();
        let mut once = Indexer::new("/tmp/unused.json");
        once.add_scan_result(&result);

        let mut twice = Indexer::new("/tmp/unused.json");
        twice.add_scan_result(&result);
        twice.add_scan_result(&result);

        assert_eq!(snapshot(&once), snapshot(&twice));
        assert_eq!(twice.file_count(), 3);
    }

    #[test]
    fn test_merge_overwrites_whole_entry() {
        let mut indexer = Indexer::new("/tmp/unused.json");
        indexer.add_scan_result(&sample_result());

        let replacement = MediaFile::new(PathBuf::from("/media/a.mkv"), 1, 5, 5);
        indexer.add_scan_result(&scan_result("/media", vec![replacement.clone()]));

        assert_eq!(indexer.get_file("/media/a.mkv"), Some(&replacement));
        assert_eq!(indexer.file_count(), 3);
        assert_eq!(indexer.get_stats().source_roots.len(), 1);
    }

    #[test]
    fn test_merge_updates_last_updated_at() {
        let mut indexer = Indexer::new("/tmp/unused.json");
        indexer.index.last_updated_at = 0;
        indexer.add_scan_result(&sample_result());
        assert!(indexer.get_stats().last_updated_at > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_are_not_merged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let bad_a = PathBuf::from("/media").join(OsStr::from_bytes(b"\xffa.mkv"));
        let bad_b = PathBuf::from("/media").join(OsStr::from_bytes(b"\xfea.mkv"));
        let mut result = sample_result();
        result.push_file(MediaFile::new(bad_a.clone(), 1, 1, 1));
        result.push_file(MediaFile::new(bad_b, 1, 1, 1));

        let mut indexer = Indexer::new("/tmp/unused.json");
        assert_eq!(indexer.add_scan_result(&result), 3);
        assert_eq!(indexer.file_count(), 3);
        assert!(indexer.get_file(&bad_a).is_none());
        assert!(matches!(
            indexer.add_file(MediaFile::new(bad_a, 1, 1, 1)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_remove_path() {
        let mut indexer = Indexer::new("/tmp/unused.json");
        indexer.add_scan_result(&sample_result());

        assert!(indexer.remove_path("/media/a.mkv"));
        assert!(!indexer.remove_path("/media/a.mkv"));
        assert!(!indexer.remove_path("/never/there.mkv"));
        assert_eq!(indexer.file_count(), 2);
    }

    #[test]
    fn test_prune_under() {
        let mut indexer = Indexer::new("/tmp/unused.json");
        indexer.add_scan_result(&sample_result());
        indexer.add_scan_result(&scan_result(
            "/media/sub",
            vec![file("/media/sub/c.mp4", 50)],
        ));
        indexer.add_scan_result(&scan_result("/other", vec![file("/other/x.mkv", 1)]));

        assert_eq!(indexer.prune_under("/media/sub"), 2);
        assert_eq!(indexer.file_count(), 2);
        assert_eq!(indexer.get_stats().source_roots, vec!["/media", "/other"]);
        assert_eq!(indexer.prune_under("/nowhere"), 0);
    }

    #[test]
    fn test_get_files_in_folder_is_exact() {
        let mut indexer = Indexer::new("/tmp/unused.json");
        indexer.add_scan_result(&sample_result());
        indexer.add_file(file("/media-archive/z.mkv", 1)).unwrap();

        let direct = indexer.get_files_in_folder("/media");
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].name, "a.mkv");

        let sub = indexer.get_files_in_folder("/media/sub/");
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].name, "c.mp4");

        let under = indexer.get_files_under("/media");
        assert_eq!(under.len(), 3);
        assert!(under.iter().all(|f| f.name != "z.mkv"));
    }

    #[test]
    fn test_get_stats() {
        let mut indexer = Indexer::new("/tmp/idx.json");
        indexer.add_scan_result(&sample_result());

        let stats = indexer.get_stats();
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.total_size_bytes, 657);
        assert_eq!(stats.extension_counts.get("mp4"), Some(&2));
        assert_eq!(stats.extension_counts.get("mkv"), Some(&1));
        assert_eq!(stats.version, INDEX_VERSION);
        assert_eq!(stats.index_path, PathBuf::from("/tmp/idx.json"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.json");

        let mut indexer = Indexer::new(&path);
        indexer.add_scan_result(&sample_result());
        indexer.save().unwrap();

        let mut fresh = Indexer::new(&path);
        fresh.load().unwrap();

        assert_eq!(fresh.get_stats(), indexer.get_stats());
        assert_eq!(snapshot(&fresh), snapshot(&indexer));
    }

    #[test]
    fn test_saved_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut indexer = Indexer::new(&path);
        indexer.add_scan_result(&sample_result());
        indexer.save().unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["version"], "1");
        assert_eq!(parsed["source_roots"][0], "/media");
        assert!(parsed["created_at"].is_i64());
        assert!(parsed["last_updated_at"].is_i64());

        let entry = &parsed["files"]["/media/sub/c.mp4"];
        assert_eq!(entry["name"], "c.mp4");
        assert_eq!(entry["extension"], "mp4");
        assert_eq!(entry["size_bytes"], 50);
        assert_eq!(entry["modified_at"], 1_700_000_000);
        assert_eq!(entry["created_at"], 1_690_000_000);
        assert_eq!(entry["parent_folder"], "/media/sub");
    }

    #[test]
    fn test_save_failure_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("index.json");
        fs::create_dir(&target).unwrap();
        File::create(target.join("keep")).unwrap();

        let mut indexer = Indexer::new(&target);
        indexer.add_scan_result(&sample_result());
        assert!(matches!(indexer.save(), Err(Error::Io { .. })));

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
        assert!(target.join("keep").exists());
    }

    #[test]
    fn test_load_missing_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut indexer = Indexer::new(dir.path().join("missing.json"));
        indexer.add_scan_result(&sample_result());

        assert!(matches!(indexer.load(), Err(Error::NotFound { .. })));
        assert_eq!(indexer.file_count(), 3);

        assert!(!indexer.load_if_exists().unwrap());
        assert_eq!(indexer.file_count(), 3);
    }

    #[test]
    fn test_load_corrupt_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut indexer = Indexer::new(&path);
        indexer.add_scan_result(&sample_result());

        for content in [
            "not json at all",
            "[1, 2, 3]",
            r#"{"version": "1", "created_at": 0}"#,
            r#"{"version": "7", "created_at": 0, "last_updated_at": 0, "source_roots": [], "files": {}}"#,
            r#"{"version": "1", "created_at": 0, "last_updated_at": 0, "source_roots": [],
                "files": {"/m/a.mkv": {"name": "a.mkv", "extension": "mkv", "size_bytes": -1,
                "modified_at": 0, "created_at": 0, "parent_folder": "/m"}}}"#,
            r#"{"version": "1", "created_at": 0, "last_updated_at": 0, "source_roots": [],
                "files": {"/m/a.mkv": {"name": "a.mkv", "extension": "mkv", "size_bytes": 1,
                "modified_at": 0, "created_at": 0, "parent_folder": "/elsewhere"}}}"#,
            r#"{"version": "1", "created_at": 0, "last_updated_at": 0, "source_roots": [],
                "files": {"/m/a.mkv": {"name": "b.mkv", "extension": "mkv", "size_bytes": 1,
                "modified_at": 0, "created_at": 0, "parent_folder": "/m"}}}"#,
            r#"{"version": "1", "created_at": 0, "last_updated_at": 0, "source_roots": [],
                "files": {"/m/a.mkv": {"name": "a.mkv", "extension": "MKV", "size_bytes": 1,
                "modified_at": 0, "created_at": 0, "parent_folder": "/m"}}}"#,
        ] {
            fs::write(&path, content).unwrap();
            let err = indexer.load().unwrap_err();
            assert!(matches!(err, Error::IndexCorrupt { .. }), "{}: {}", content, err);
            assert!(matches!(indexer.load_if_exists(), Err(Error::IndexCorrupt { .. })));
            assert_eq!(indexer.file_count(), 3);
        }
    }

    #[test]
    fn test_load_upgrades_legacy_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        fs::write(
            &path,
            r#"{
              "updated_at": "2024-01-02T00:00:00+00:00",
              "file_count": 2,
              "files": {
                "/media/a.mkv": {
                  "path": "/media/a.mkv", "name": "a.mkv", "extension": "mkv",
                  "size_bytes": 1048576, "size_mb": 1.0,
                  "modified_at": "2024-01-01T00:00:00+00:00",
                  "created_at": "2023-12-31T00:00:00+00:00",
                  "duration_seconds": null
                },
                "/media/sub/b.mp4": {
                  "path": "/media/sub/b.mp4", "name": "b.mp4", "extension": "mp4",
                  "size_bytes": 10, "size_mb": 0.0,
                  "modified_at": "2024-01-01T00:00:00.500000",
                  "created_at": null,
                  "duration_seconds": null
                }
              }
            }"#,
        )
        .unwrap();

        let indexer = Indexer::open(&path).unwrap();
        let stats = indexer.get_stats();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.version, INDEX_VERSION);
        assert_eq!(stats.last_updated_at, 1_704_153_600);

        let a = indexer.get_file("/media/a.mkv").unwrap();
        assert_eq!(a.modified_at, 1_704_067_200);
        assert_eq!(a.created_at, 1_703_980_800);
        assert_eq!(a.parent_folder, PathBuf::from("/media"));

        let b = indexer.get_file("/media/sub/b.mp4").unwrap();
        assert_eq!(b.created_at, b.modified_at);
    }

    #[test]
    fn test_load_rejects_lossy_legacy_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        fs::write(
            &path,
            r#"{
              "updated_at": "2024-01-02T00:00:00+00:00",
              "file_count": 1,
              "files": {
                "/media/a.mkv": {
                  "path": "/media/a.mkv", "name": "a.mkv", "extension": "mkv",
                  "size_bytes": 1, "size_mb": 0.0,
                  "modified_at": "2024-01-01T00:00:00+00:00",
                  "created_at": null,
                  "duration_seconds": 93.5
                }
              }
            }"#,
        )
        .unwrap();

        assert!(matches!(
            Indexer::open(&path),
            Err(Error::IndexCorrupt { .. })
        ));
    }

    #[test]
    fn test_scan_index_reload_scenario() {
        let media = tempfile::tempdir().unwrap();
        File::create(media.path().join("a.mkv")).unwrap().set_len(600).unwrap();
        File::create(media.path().join("b.txt")).unwrap();
        fs::create_dir(media.path().join("sub")).unwrap();
        File::create(media.path().join("sub").join("c.mp4")).unwrap().set_len(50).unwrap();

        let result = Scanner::default().scan(media.path(), true, None).unwrap();
        let out = tempfile::tempdir().unwrap();
        let index_path = out.path().join("index.json");

        let mut indexer = Indexer::new(&index_path);
        indexer.add_scan_result(&result);
        indexer.save().unwrap();

        let mut reloaded = Indexer::new(&index_path);
        reloaded.load().unwrap();

        let root = result.root_path().to_path_buf();
        let top = reloaded.get_files_in_folder(&root);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "a.mkv");
        assert_eq!(reloaded.get_files_under(&root).len(), 2);
        assert_eq!(reloaded.get_stats().total_size_bytes, 650);
    }
}
