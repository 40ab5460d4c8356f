//! Scan configuration
//!
//! The scanner never reads the environment or configuration files itself; callers
//! build a [`ScanOptions`] value and inject it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Built-in media extensions used when no set is supplied
pub const DEFAULT_EXTENSIONS: [&str; 7] = ["mkv", "mp4", "avi", "webm", "mov", "wmv", "flv"];

/// Get the default extension set
pub fn default_extensions() -> HashSet<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

/// Lowercase each extension and strip a leading dot
pub fn normalize_extensions<I, S>(extensions: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Parse a comma-separated extension list such as `mkv,.MP4`
pub fn parse_extension_list(list: &str) -> HashSet<String> {
    normalize_extensions(list.split(','))
}

/// Options for a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Extensions to include when a scan does not supply its own set
    pub extensions: HashSet<String>,

    /// Whether to scan subdirectories recursively
    pub recursive: bool,

    /// Maximum depth for recursive scanning (None = unbounded)
    pub max_depth: Option<usize>,

    /// Follow symbolic links. Cycles are detected and skipped.
    pub follow_links: bool,

    /// Directory names to skip entirely
    pub ignore_dirs: HashSet<String>,

    /// Number of threads used to stat files.
    /// 0 means rayon's default (one per CPU)
    pub num_threads: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            recursive: true,
            max_depth: None,
            follow_links: false,
            ignore_dirs: HashSet::new(),
            num_threads: 0,
        }
    }
}

impl ScanOptions {
    /// Create an options builder
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::new()
    }

    /// Resolve the extension set for one scan.
    ///
    /// A missing or empty override falls back to the configured set, and the
    /// configured set falls back to [`DEFAULT_EXTENSIONS`].
    pub fn effective_extensions(&self, overrides: Option<&HashSet<String>>) -> HashSet<String> {
        let chosen = overrides
            .filter(|set| !set.is_empty())
            .unwrap_or(&self.extensions);
        let normalized = normalize_extensions(chosen);
        if normalized.is_empty() {
            default_extensions()
        } else {
            normalized
        }
    }

    /// Check if a directory should be skipped
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        self.ignore_dirs.contains(name)
    }

    /// Get the walkdir depth limit
    pub fn effective_max_depth(&self, recursive: bool) -> usize {
        if !recursive {
            1 // Only immediate children
        } else {
            self.max_depth.unwrap_or(usize::MAX)
        }
    }
}

/// Builder for ScanOptions
#[derive(Debug, Default)]
pub struct ScanOptionsBuilder {
    options: ScanOptions,
}

impl ScanOptionsBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default extension set (normalized)
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.options.extensions = normalize_extensions(extensions);
        self
    }

    /// Enable or disable recursive scanning
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.options.recursive = enabled;
        self
    }

    /// Limit recursion depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = Some(depth);
        self
    }

    /// Follow symbolic links
    pub fn follow_links(mut self, enabled: bool) -> Self {
        self.options.follow_links = enabled;
        self
    }

    /// Add a directory name to skip
    pub fn add_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.options.ignore_dirs.insert(dir.into());
        self
    }

    /// Set the number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.options.num_threads = threads;
        self
    }

    /// Build the options
    pub fn build(self) -> ScanOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ScanOptions::default();
        assert!(options.recursive);
        assert!(!options.follow_links);
        assert_eq!(options.max_depth, None);
        assert_eq!(options.num_threads, 0);
        assert_eq!(options.extensions, default_extensions());
    }

    #[test]
    fn test_default_extensions() {
        let extensions = default_extensions();
        assert_eq!(extensions.len(), 7);
        for ext in ["mkv", "mp4", "avi", "webm", "mov", "wmv", "flv"] {
            assert!(extensions.contains(ext));
        }
        assert!(!extensions.contains("txt"));
    }

    #[test]
    fn test_normalize_extensions() {
        let set = normalize_extensions([".MKV", "mp4", " .Avi ", ""]);
        assert_eq!(set.len(), 3);
        assert!(set.contains("mkv"));
        assert!(set.contains("mp4"));
        assert!(set.contains("avi"));
    }

    #[test]
    fn test_parse_extension_list() {
        let set = parse_extension_list("mkv,.MP4,,webm");
        assert_eq!(set, normalize_extensions(["mkv", "mp4", "webm"]));
    }

    #[test]
    fn test_effective_extensions() {
        let options = ScanOptions::builder().extensions(["mkv"]).build();
        assert_eq!(options.effective_extensions(None), normalize_extensions(["mkv"]));

        let overrides = normalize_extensions(["MOV"]);
        assert_eq!(
            options.effective_extensions(Some(&overrides)),
            normalize_extensions(["mov"])
        );

        let empty = HashSet::new();
        assert_eq!(
            options.effective_extensions(Some(&empty)),
            normalize_extensions(["mkv"])
        );

        let bare = ScanOptions::builder().extensions(Vec::<String>::new()).build();
        assert_eq!(bare.effective_extensions(None), default_extensions());
    }

    #[test]
    fn test_effective_max_depth() {
        let options = ScanOptions::default();
        assert_eq!(options.effective_max_depth(false), 1);
        assert_eq!(options.effective_max_depth(true), usize::MAX);

        let limited = ScanOptions::builder().max_depth(3).build();
        assert_eq!(limited.effective_max_depth(true), 3);
        assert_eq!(limited.effective_max_depth(false), 1);
    }

    #[test]
    fn test_options_builder() {
        let options = ScanOptions::builder()
            .recursive(false)
            .follow_links(true)
            .add_ignore_dir("@eaDir")
            .num_threads(4)
            .build();

        assert!(!options.recursive);
        assert!(options.follow_links);
        assert!(options.should_ignore_dir("@eaDir"));
        assert!(!options.should_ignore_dir("Movies"));
        assert_eq!(options.num_threads, 4);
    }
}
