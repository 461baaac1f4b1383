use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking lifecycle outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    /// Storage events received from the subscription.
    pub received: AtomicU64,
    /// Draft records created.
    pub created: AtomicU64,
    /// Draft records refreshed by an overwrite.
    pub updated: AtomicU64,
    /// Draft records closed.
    pub closed: AtomicU64,
    /// Version-replacement deletes that were deliberately ignored.
    pub suppressed: AtomicU64,
    /// Well-formed events that needed no action (replays, lost races,
    /// disabled notifications).
    pub skipped: AtomicU64,
    /// Malformed events acknowledged without action.
    pub dropped: AtomicU64,
    /// Events left for redelivery after a transient failure.
    pub failed: AtomicU64,
    /// Notification messages published.
    pub published: AtomicU64,
    /// Open draft records, as last read from the store.
    pub open_drafts: AtomicU64,
}

impl LifecycleMetrics {
    pub fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_closed(&self, count: u64) {
        self.closed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_open_drafts(&self, count: u64) {
        self.open_drafts.store(count, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            open_drafts: self.open_drafts.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`LifecycleMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub created: u64,
    pub updated: u64,
    pub closed: u64,
    pub suppressed: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub failed: u64,
    pub published: u64,
    pub open_drafts: u64,
}
