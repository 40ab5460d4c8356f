//! Media event subscriptions
//!
//! Scans publish a [`MediaEvent`] per discovered file and one when they finish;
//! observers publish modifications and deletions. Subscribers register a callback for the kinds
//! they care about.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::MediaFile;

/// Event kinds used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEventKind {
    FileDiscovered,
    FileModified,
    FileDeleted,
    ScanCompleted,
}

/// Something that happened to a media file or a scan
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MediaEvent {
    /// A matching file was found by a scan or reported by an observer
    FileDiscovered { file: MediaFile, source: PathBuf },
    /// A watched file's content changed; `file` is the fresh snapshot
    FileModified { file: MediaFile, source: PathBuf },
    /// A matching file disappeared
    FileDeleted { path: PathBuf, source: PathBuf },
    /// A scan finished
    ScanCompleted {
        root: PathBuf,
        files_found: usize,
        total_size_bytes: u64,
        error_count: usize,
        duration_ms: u64,
    },
}

impl MediaEvent {
    pub fn kind(&self) -> MediaEventKind {
        match self {
            MediaEvent::FileDiscovered { .. } => MediaEventKind::FileDiscovered,
            MediaEvent::FileModified { .. } => MediaEventKind::FileModified,
            MediaEvent::FileDeleted { .. } => MediaEventKind::FileDeleted,
            MediaEvent::ScanCompleted { .. } => MediaEventKind::ScanCompleted,
        }
    }
}

/// Subscriber callback
pub type EventCallback = Arc<dyn Fn(&MediaEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    kinds: Vec<MediaEventKind>,
    callback: EventCallback,
}

/// Thread-safe registry of event subscribers
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for the given event kinds
    pub fn subscribe<F>(&self, kinds: &[MediaEventKind], callback: F) -> SubscriptionId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        };
        self.lock().insert(id, subscription);
        log::debug!("Added subscription {:?} for {:?}", id, kinds);
        id
    }

    /// Remove a subscription; false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            log::debug!("Removed subscription {:?}", id);
        }
        removed
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Callbacks are collected under the lock and invoked after it is released,
    /// so a callback may subscribe or unsubscribe without deadlocking.
    pub fn emit(&self, event: &MediaEvent) {
        let kind = event.kind();
        let callbacks: Vec<EventCallback> = self
            .lock()
            .values()
            .filter(|s| s.kinds.contains(&kind))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, Subscription>> {
        // A panicking subscriber cannot leave the map half-updated
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
