//! Live filesystem observer
//!
//! Watching is optional: scanning and indexing never depend on it. The notify-backed
//! implementation is compiled only with the `watch` feature; use
//! [`observer_available`] to detect it at runtime.
//!
//! Callbacks run on the observer's own notification thread. Anything that needs
//! to touch an [`crate::Indexer`] should hand the path over a channel (or another
//! thread-safe boundary) instead of mutating the index directly.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::events::{EventBus, MediaEvent};
use crate::scanner::get_file_info;

#[cfg(feature = "watch")]
pub use backend::NotifyObserver;

/// Callback receiving the path of a created or deleted media file
pub type PathCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// A change observed for a matching file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

/// Capability interface for live observers
pub trait MediaObserver: Send {
    /// Start watching `path`, reporting matching files to the callbacks
    fn start(
        &mut self,
        path: &Path,
        recursive: bool,
        on_created: PathCallback,
        on_modified: PathCallback,
        on_deleted: PathCallback,
    ) -> Result<()>;

    /// Stop watching one folder; false if it was not watched
    fn unwatch(&mut self, path: &Path) -> bool;

    /// Stop watching everything
    fn stop(&mut self);

    fn is_watching(&self) -> bool;

    fn watched_folders(&self) -> Vec<PathBuf>;
}

/// Whether a live observer is compiled into this build
pub fn observer_available() -> bool {
    cfg!(feature = "watch")
}

/// The observer for this build, if any
#[cfg(feature = "watch")]
pub fn default_observer(extensions: HashSet<String>) -> Option<Box<dyn MediaObserver>> {
    Some(Box::new(NotifyObserver::new(extensions)))
}

/// The observer for this build, if any
#[cfg(not(feature = "watch"))]
pub fn default_observer(_extensions: HashSet<String>) -> Option<Box<dyn MediaObserver>> {
    None
}

/// Start `observer` on `path` and publish what it sees on `bus`.
///
/// Created and modified files are stat'ed and published as
/// [`MediaEvent::FileDiscovered`] and [`MediaEvent::FileModified`]; deletions become
/// [`MediaEvent::FileDeleted`].
pub fn forward_to_bus(
    observer: &mut dyn MediaObserver,
    path: &Path,
    recursive: bool,
    bus: Arc<EventBus>,
) -> Result<()> {
    let source = path.to_path_buf();

    let created_bus = Arc::clone(&bus);
    let created_source = source.clone();
    let on_created: PathCallback = Arc::new(move |file_path: &Path| {
        match get_file_info(file_path) {
            Ok(file) => created_bus.emit(&MediaEvent::FileDiscovered {
                file,
                source: created_source.clone(),
            }),
            Err(e) => log::warn!("Error reading new file {:?}: {}", file_path, e),
        }
    });

    let modified_bus = Arc::clone(&bus);
    let modified_source = source.clone();
    let on_modified: PathCallback = Arc::new(move |file_path: &Path| {
        match get_file_info(file_path) {
            Ok(file) => modified_bus.emit(&MediaEvent::FileModified {
                file,
                source: modified_source.clone(),
            }),
            Err(e) => log::warn!("Error reading modified file {:?}: {}", file_path, e),
        }
    });

    let on_deleted: PathCallback = Arc::new(move |file_path: &Path| {
        bus.emit(&MediaEvent::FileDeleted {
            path: file_path.to_path_buf(),
            source: source.clone(),
        });
    });

    observer.start(path, recursive, on_created, on_modified, on_deleted)
}

#[cfg(feature = "watch")]
mod backend {
    use notify::event::{ModifyKind, RenameMode};
    use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    use super::{MediaObserver, PathCallback, WatchEvent};
    use crate::config::normalize_extensions;
    use crate::error::{Error, Result};
    use crate::models::extension_of;

    /// Translate a notify event into media creates/deletes.
    ///
    /// Renames are reported as a delete of the old name and a create of the new one.
    /// Content writes are reported as modifications; metadata-only changes are not.
    pub(crate) fn classify(event: &Event, extensions: &HashSet<String>) -> Vec<WatchEvent> {
        let is_media = |p: &PathBuf| extensions.contains(&extension_of(p));
        let created = |paths: &[PathBuf]| -> Vec<WatchEvent> {
            paths
                .iter()
                .filter(|p| is_media(*p))
                .cloned()
                .map(WatchEvent::Created)
                .collect()
        };
        let modified = |paths: &[PathBuf]| -> Vec<WatchEvent> {
            paths
                .iter()
                .filter(|p| is_media(*p))
                .cloned()
                .map(WatchEvent::Modified)
                .collect()
        };
        let deleted = |paths: &[PathBuf]| -> Vec<WatchEvent> {
            paths
                .iter()
                .filter(|p| is_media(*p))
                .cloned()
                .map(WatchEvent::Deleted)
                .collect()
        };

        match &event.kind {
            EventKind::Create(_) => created(&event.paths),
            EventKind::Remove(_) => deleted(&event.paths),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => deleted(&event.paths),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => created(&event.paths),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                let mut changes = deleted(&event.paths[..1]);
                changes.extend(created(&event.paths[1..]));
                changes
            }
            EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
                modified(&event.paths)
            }
            _ => Vec::new(),
        }
    }

    /// Observer backed by the platform's recommended notify watcher.
    ///
    /// Each watched folder owns its watcher; dropping it stops the notification thread.
    pub struct NotifyObserver {
        extensions: HashSet<String>,
        watchers: HashMap<PathBuf, RecommendedWatcher>,
    }

    impl NotifyObserver {
        pub fn new(extensions: HashSet<String>) -> Self {
            Self {
                extensions: normalize_extensions(&extensions),
                watchers: HashMap::new(),
            }
        }
    }

    impl MediaObserver for NotifyObserver {
        fn start(
            &mut self,
            path: &Path,
            recursive: bool,
            on_created: PathCallback,
            on_modified: PathCallback,
            on_deleted: PathCallback,
        ) -> Result<()> {
            let metadata = fs::metadata(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::not_found(path),
                _ => Error::io(path, e),
            })?;
            if !metadata.is_dir() {
                return Err(Error::NotADirectory(path.to_path_buf()));
            }
            let folder = fs::canonicalize(path).map_err(|e| Error::io(path, e))?;

            let extensions = self.extensions.clone();
            let mut watcher =
                notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                    Ok(event) => {
                        for change in classify(&event, &extensions) {
                            match change {
                                WatchEvent::Created(p) => {
                                    if p.is_dir() {
                                        continue;
                                    }
                                    log::debug!("File created: {:?}", p);
                                    on_created(&p);
                                }
                                WatchEvent::Modified(p) => {
                                    if p.is_dir() {
                                        continue;
                                    }
                                    log::debug!("File modified: {:?}", p);
                                    on_modified(&p);
                                }
                                WatchEvent::Deleted(p) => {
                                    log::debug!("File deleted: {:?}", p);
                                    on_deleted(&p);
                                }
                            }
                        }
                    }
                    Err(e) => log::warn!("Watch error: {}", e),
                })?;

            let mode = if recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(&folder, mode)?;

            log::info!("Watching folder: {:?} (recursive={})", folder, recursive);
            self.watchers.insert(folder, watcher);
            Ok(())
        }

        fn unwatch(&mut self, path: &Path) -> bool {
            let folder = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            let removed = self.watchers.remove(&folder).is_some();
            if removed {
                log::info!("Stopped watching folder: {:?}", folder);
            }
            removed
        }

        fn stop(&mut self) {
            if !self.watchers.is_empty() {
                log::debug!("Stopping {} watchers", self.watchers.len());
            }
            self.watchers.clear();
        }

        fn is_watching(&self) -> bool {
            !self.watchers.is_empty()
        }

        fn watched_folders(&self) -> Vec<PathBuf> {
            self.watchers.keys().cloned().collect()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MediaEventKind;
    use std::sync::Mutex;

    /// Observer that hands its callbacks to the test
    #[derive(Default)]
    struct ManualObserver {
        callbacks: Option<(PathCallback, PathCallback, PathCallback)>,
        folders: Vec<PathBuf>,
    }

    impl MediaObserver for ManualObserver {
        fn start(
            &mut self,
            path: &Path,
            _recursive: bool,
            on_created: PathCallback,
            on_modified: PathCallback,
            on_deleted: PathCallback,
        ) -> Result<()> {
            self.callbacks = Some((on_created, on_modified, on_deleted));
            self.folders.push(path.to_path_buf());
            Ok(())
        }

        fn unwatch(&mut self, path: &Path) -> bool {
            let before = self.folders.len();
            self.folders.retain(|f| f != path);
            before != self.folders.len()
        }

        fn stop(&mut self) {
            self.callbacks = None;
            self.folders.clear();
        }

        fn is_watching(&self) -> bool {
            !self.folders.is_empty()
        }

        fn watched_folders(&self) -> Vec<PathBuf> {
            self.folders.clone()
        }
    }

    #[test]
    fn test_observer_available_matches_feature() {
        assert_eq!(observer_available(), cfg!(feature = "watch"));
        assert_eq!(
            default_observer(HashSet::new()).is_some(),
            observer_available()
        );
    }

    #[test]
    fn test_forward_to_bus() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.mkv");
        std::fs::write(&file, b"0123456789").unwrap();

        let bus = Arc::new(EventBus::new());
        let seen: Arc<Mutex<Vec<MediaEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(
            &[
                MediaEventKind::FileDiscovered,
                MediaEventKind::FileModified,
                MediaEventKind::FileDeleted,
            ],
            move |event| sink.lock().unwrap().push(event.clone()),
        );

        let mut observer = ManualObserver::default();
        forward_to_bus(&mut observer, dir.path(), true, Arc::clone(&bus)).unwrap();
        assert!(observer.is_watching());

        let (on_created, on_modified, on_deleted) = observer.callbacks.clone().unwrap();
        on_created(&file);
        on_created(&dir.path().join("vanished.mkv"));
        std::fs::write(&file, b"0123456789abcdef").unwrap();
        on_modified(&file);
        on_deleted(&file);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        match &seen[0] {
            MediaEvent::FileDiscovered { file: media, .. } => {
                assert_eq!(media.name, "new.mkv");
                assert_eq!(media.size_bytes, 10);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match &seen[1] {
            MediaEvent::FileModified { file: media, .. } => assert_eq!(media.size_bytes, 16),
            other => panic!("unexpected event {:?}", other),
        }
        match &seen[2] {
            MediaEvent::FileDeleted { path, .. } => assert_eq!(path, &file),
            other => panic!("unexpected event {:?}", other),
        }

        observer.stop();
        assert!(!observer.is_watching());
    }
}
