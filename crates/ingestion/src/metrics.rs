//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::SourceStats;

/// Packet source counters, shared between the source and its observers
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Lidar datagrams received
    pub datagrams_received: AtomicU64,

    /// Malformed or truncated lidar datagrams
    pub datagrams_dropped: AtomicU64,

    /// Valid columns decoded
    pub columns_decoded: AtomicU64,

    /// Columns with an invalid status word
    pub invalid_columns: AtomicU64,

    /// IMU datagrams received
    pub imu_received: AtomicU64,

    /// Malformed IMU datagrams
    pub imu_dropped: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_datagram(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_datagram_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_columns(&self, valid: usize, invalid: usize) {
        self.columns_decoded
            .fetch_add(valid as u64, Ordering::Relaxed);
        self.invalid_columns
            .fetch_add(invalid as u64, Ordering::Relaxed);
    }

    pub fn record_imu(&self) {
        self.imu_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_imu_dropped(&self) {
        self.imu_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> SourceStats {
        SourceStats {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            columns_decoded: self.columns_decoded.load(Ordering::Relaxed),
            invalid_columns: self.invalid_columns.load(Ordering::Relaxed),
            imu_received: self.imu_received.load(Ordering::Relaxed),
            imu_dropped: self.imu_dropped.load(Ordering::Relaxed),
        }
    }
}
