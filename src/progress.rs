//! Progress reporting for scan operations
//!
//! Turns [`MediaEvent`]s into compact JSON lines on stderr so that a calling
//! process can follow a long scan.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::events::{EventBus, MediaEvent, MediaEventKind, SubscriptionId};

/// Start message sent when scan begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Scan root path
    pub root: String,
    /// Whether recursive scanning is enabled
    pub recursive: bool,
    /// Extensions being matched
    pub extensions: Vec<String>,
}

/// Progress message sent while files are discovered
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Number of files discovered
    #[serde(rename = "f")]
    pub files: u64,
    /// Bytes discovered
    #[serde(rename = "b")]
    pub bytes: u64,
    /// Folder of the most recent file
    pub dir: String,
}

/// Done message sent when scan completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    pub seq: u64,
    pub ts: u64,
    /// Total number of files found
    #[serde(rename = "tf")]
    pub total_files: usize,
    /// Total size in bytes
    #[serde(rename = "tb")]
    pub total_bytes: u64,
    /// Number of errors encountered
    #[serde(rename = "ec")]
    pub error_count: usize,
    /// Total scan duration in milliseconds
    pub ms: u64,
}

/// A line the reporter may emit for an event
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProgressLine {
    Progress(ProgressMessage),
    Done(DoneMessage),
}

/// Progress reporter writing JSON lines to stderr
///
/// Discovery events are throttled to one line per `interval_ms`; completion is
/// always reported.
pub struct ProgressReporter {
    enabled: bool,
    interval_ms: u64,
    last_report: Mutex<Instant>,
    seq: AtomicU64,
    files: AtomicU64,
    bytes: AtomicU64,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(now),
            seq: AtomicU64::new(0),
            files: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            start_time: now,
        }
    }

    /// Subscribe to scan events on `bus`. Returns None when disabled.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Option<SubscriptionId> {
        if !self.enabled {
            return None;
        }
        let reporter = Arc::clone(self);
        Some(bus.subscribe(
            &[MediaEventKind::FileDiscovered, MediaEventKind::ScanCompleted],
            move |event| reporter.handle_event(event),
        ))
    }

    /// Check if enough time has passed since the last progress line
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let last = *self
            .last_report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        last.elapsed().as_millis() as u64 >= self.interval_ms
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    /// Report scan start
    pub fn report_start(&self, root: &Path, recursive: bool, extensions: &[String]) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage {
            msg_type: "start",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            root: root.to_string_lossy().into_owned(),
            recursive,
            extensions: extensions.to_vec(),
        };
        self.output_to_stderr(&msg);
    }

    /// Report a scan event, if it warrants a line
    pub fn handle_event(&self, event: &MediaEvent) {
        if let Some(line) = self.message_for(event) {
            self.output_to_stderr(&line);
        }
    }

    /// Update counters from `event` and build the line to emit, if any
    pub fn message_for(&self, event: &MediaEvent) -> Option<ProgressLine> {
        if !self.enabled {
            return None;
        }

        match event {
            MediaEvent::FileDiscovered { file, .. } => {
                let files = self.files.fetch_add(1, Ordering::Relaxed) + 1;
                let bytes = self.bytes.fetch_add(file.size_bytes, Ordering::Relaxed)
                    + file.size_bytes;
                if !self.should_report() {
                    return None;
                }
                *self
                    .last_report
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
                Some(ProgressLine::Progress(ProgressMessage {
                    msg_type: "p",
                    seq: self.next_seq(),
                    ts: self.current_timestamp(),
                    files,
                    bytes,
                    dir: file.parent_folder.to_string_lossy().into_owned(),
                }))
            }
            MediaEvent::ScanCompleted {
                files_found,
                total_size_bytes,
                error_count,
                duration_ms,
                ..
            } => Some(ProgressLine::Done(DoneMessage {
                msg_type: "done",
                seq: self.next_seq(),
                ts: self.current_timestamp(),
                total_files: *files_found,
                total_bytes: *total_size_bytes,
                error_count: *error_count,
                ms: *duration_ms,
            })),
            MediaEvent::FileModified { .. } | MediaEvent::FileDeleted { .. } => None,
        }
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
