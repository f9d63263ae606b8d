//! Per-sink delivery counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::Topic;

/// Delivery counters of one sink worker, shared with its handle
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_depth: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    /// Misses of a full queue, indexed like `Topic::ALL`
    dropped: [AtomicU64; Topic::ALL.len()],
    last_seq: AtomicU64,
}

fn slot(topic: Topic) -> usize {
    Topic::ALL.iter().position(|t| *t == topic).unwrap_or_default()
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self, seq: u64) {
        self.written.fetch_add(1, Ordering::Relaxed);
        self.last_seq.store(seq, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, topic: Topic) {
        self.dropped[slot(topic)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Samples this sink missed on `topic`
    pub fn dropped_for(&self, topic: Topic) -> u64 {
        self.dropped[slot(topic)].load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.iter().map(|d| d.load(Ordering::Relaxed)).sum()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            written: self.written(),
            failed: self.failed(),
            dropped: self.dropped(),
            last_seq: self.last_seq.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_depth: usize,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
    /// Sequence number of the last message written
    pub last_seq: u64,
}
