//! Scanner module - walks a directory tree and collects matching media files
//!
//! Traversal happens on the calling thread in directory-entry order (not sorted).
//! Candidate files are then stat'ed on a bounded rayon pool; results are put back
//! in traversal order, so the output is reproducible for a given filesystem state.

use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

use crate::config::ScanOptions;
use crate::error::{Error, Result, ScanError, ScanErrorKind};
use crate::events::{EventBus, MediaEvent};
use crate::models::{extension_of, MediaFile, ScanResult};

/// Shared flag for aborting a scan between directory entries
pub type CancelFlag = Arc<AtomicBool>;

/// Directory scanner
#[derive(Debug, Default)]
pub struct Scanner {
    options: ScanOptions,
    events: Option<Arc<EventBus>>,
    cancel: Option<CancelFlag>,
}

impl Scanner {
    /// Create a scanner with injected options
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            events: None,
            cancel: None,
        }
    }

    /// Publish discovery and completion events to `bus`
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Abort scans once `flag` is set
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan using the recursion setting and extensions from the options
    pub fn scan_default(&self, root: impl AsRef<Path>) -> Result<ScanResult> {
        self.scan(root, self.options.recursive, None)
    }

    /// Scan `root` for files whose extension is in `extensions`
    /// (or the configured set when `None`).
    ///
    /// Files that cannot be stat'ed are recorded in [`ScanResult::errors`]; only a
    /// missing or non-directory root, or cancellation, fails the scan.
    pub fn scan(
        &self,
        root: impl AsRef<Path>,
        recursive: bool,
        extensions: Option<&HashSet<String>>,
    ) -> Result<ScanResult> {
        let root = resolve_root(root.as_ref())?;
        let extensions = self.options.effective_extensions(extensions);

        let start = Instant::now();
        let mut result = ScanResult::new(root.clone(), unix_now());
        let mut extensions_scanned: Vec<String> = extensions.iter().cloned().collect();
        extensions_scanned.sort();
        result.extensions_scanned = extensions_scanned;

        log::debug!("Scanning folder: {:?} (recursive={})", root, recursive);

        let candidates = self.collect_candidates(&root, recursive, &extensions, &mut result)?;

        let outcomes = stat_all(&candidates, self.options.num_threads, self.cancel.as_ref())
            .inspect_err(|_| log::info!("Scan of {:?} cancelled", root))?;
        for outcome in outcomes {
            match outcome {
                Ok(file) => {
                    if let Some(bus) = &self.events {
                        bus.emit(&MediaEvent::FileDiscovered {
                            file: file.clone(),
                            source: root.clone(),
                        });
                    }
                    result.push_file(file);
                }
                Err(e) => {
                    log::warn!("{}", e.message);
                    result.errors.push(e);
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "Scan complete: {} files, {:.2} GB in {}ms ({} errors)",
            result.file_count(),
            result.total_size_gb(),
            result.duration_ms,
            result.error_count()
        );

        if let Some(bus) = &self.events {
            bus.emit(&MediaEvent::ScanCompleted {
                root,
                files_found: result.file_count(),
                total_size_bytes: result.total_size_bytes(),
                error_count: result.error_count(),
                duration_ms: result.duration_ms,
            });
        }

        Ok(result)
    }

    /// Walk the tree and return matching file paths in traversal order
    fn collect_candidates(
        &self,
        root: &Path,
        recursive: bool,
        extensions: &HashSet<String>,
        result: &mut ScanResult,
    ) -> Result<Vec<PathBuf>> {
        let follow_links = self.options.follow_links;
        let mut candidates = Vec::new();
        // Real paths already collected; a followed link can reach the same file twice
        let mut seen: HashSet<PathBuf> = HashSet::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(self.options.effective_max_depth(recursive))
            .follow_links(follow_links)
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.options.should_ignore_dir(name))
            });

        for entry in walker {
            if self.is_cancelled() {
                log::info!("Scan of {:?} cancelled", root);
                return Err(Error::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // walkdir tracks ancestor directories when following links
                    if let Some(ancestor) = e.loop_ancestor() {
                        log::debug!(
                            "Skipping symlink cycle at {:?} (points to {:?})",
                            e.path(),
                            ancestor
                        );
                        continue;
                    }
                    let err = ScanError::from_walk(&e, root);
                    log::warn!("{}", err.message);
                    result.errors.push(err);
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                log::debug!("Skipping non-regular entry: {:?}", entry.path());
                continue;
            }

            let path = entry.path();
            if !extensions.contains(&extension_of(path)) {
                continue;
            }

            if !follow_links {
                push_candidate(path.to_path_buf(), &mut candidates, result);
                continue;
            }

            let real = match fs::canonicalize(path) {
                Ok(real) => real,
                Err(e) => {
                    let err = ScanError::from_io(path, &e);
                    log::warn!("{}", err.message);
                    result.errors.push(err);
                    continue;
                }
            };
            if !real.starts_with(root) {
                log::warn!("Skipping symlink outside scan root: {:?}", path);
                continue;
            }
            if seen.insert(real.clone()) {
                push_candidate(real, &mut candidates, result);
            }
        }

        Ok(candidates)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Queue `path` for stat'ing. Index keys are UTF-8 strings, so other paths are
/// recorded as errors instead.
fn push_candidate(path: PathBuf, candidates: &mut Vec<PathBuf>, result: &mut ScanResult) {
    if path.to_str().is_some() {
        candidates.push(path);
        return;
    }
    let err = ScanError::new(
        ScanErrorKind::Unknown,
        path.clone(),
        format!("Path is not valid UTF-8: {}", path.display()),
    );
    log::warn!("{}", err.message);
    result.errors.push(err);
}

/// Get metadata for a single file
pub fn get_file_info(path: impl AsRef<Path>) -> Result<MediaFile> {
    let path = path.as_ref();
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::not_found(path),
        _ => Error::io(path, e),
    })?;
    if !metadata.is_file() {
        return Err(Error::NotFound {
            path: path.to_path_buf(),
            reason: "Path is not a regular file",
        });
    }

    let canonical = fs::canonicalize(path).map_err(|e| Error::io(path, e))?;
    if canonical.to_str().is_none() {
        return Err(Error::InvalidArgument(format!(
            "Path is not valid UTF-8: {}",
            canonical.display()
        )));
    }
    stat_media_file(&canonical).map_err(|e| Error::io(&canonical, e))
}

/// Validate the scan root and return its canonical form
fn resolve_root(root: &Path) -> Result<PathBuf> {
    let metadata = fs::metadata(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::not_found(root),
        _ => Error::io(root, e),
    })?;
    if !metadata.is_dir() {
        return Err(Error::NotADirectory(root.to_path_buf()));
    }
    fs::canonicalize(root).map_err(|e| Error::io(root, e))
}

type StatOutcome = std::result::Result<MediaFile, ScanError>;

/// Stat every candidate, keeping input order.
///
/// `cancel` is checked before each stat; once set the remaining work is dropped and
/// the whole call fails with [`Error::Cancelled`].
fn stat_all(
    paths: &[PathBuf],
    num_threads: usize,
    cancel: Option<&CancelFlag>,
) -> Result<Vec<StatOutcome>> {
    let read = |path: &PathBuf| -> Result<StatOutcome> {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(Error::Cancelled);
        }
        Ok(stat_media_file(path).map_err(|e| ScanError::from_io(path, &e)))
    };

    match rayon::ThreadPoolBuilder::new().num_threads(num_threads).build() {
        Ok(pool) => pool.install(|| paths.par_iter().map(read).collect()),
        Err(e) => {
            log::warn!("Failed to build stat pool, falling back to sequential: {}", e);
            paths.iter().map(read).collect()
        }
    }
}

fn stat_media_file(path: &Path) -> io::Result<MediaFile> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "entry is no longer a regular file",
        ));
    }

    let modified_at = unix_seconds(metadata.modified()?);
    // Birth time is best-effort; MediaFile clamps it to the modification time
    let created_at = metadata
        .created()
        .map(unix_seconds)
        .unwrap_or(modified_at);

    Ok(MediaFile::new(
        path.to_path_buf(),
        metadata.len(),
        modified_at,
        created_at,
    ))
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Current time as a Unix timestamp (seconds)
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
