//! Media file scanner with a persisted, mergeable index
//!
//! [`Scanner`] walks a directory tree and produces a [`ScanResult`]; the
//! [`filters`] helpers slice that result; [`Indexer`] merges scan results into a
//! JSON index on disk that can be reloaded without rescanning.

pub mod config;
pub mod error;
pub mod events;
pub mod filters;
pub mod indexer;
pub mod models;
pub mod progress;
pub mod scanner;
pub mod watch;

pub use config::{default_extensions, ScanOptions, DEFAULT_EXTENSIONS};
pub use error::{Error, Result, ScanError, ScanErrorKind};
pub use events::{EventBus, MediaEvent, MediaEventKind, SubscriptionId};
pub use filters::{filter_by_extension, filter_by_size, group_by_folder, FolderGroup};
pub use indexer::{IndexStats, Indexer, INDEX_VERSION};
pub use models::{MediaFile, ScanResult};
pub use progress::ProgressReporter;
pub use scanner::{get_file_info, CancelFlag, Scanner};
pub use watch::{default_observer, observer_available, MediaObserver, PathCallback, WatchEvent};
