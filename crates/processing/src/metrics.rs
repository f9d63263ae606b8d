//! Processor counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Degradation counters shared by all processors
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// Columns ignored for a beam count mismatch or an out-of-range index
    pub skipped_columns: AtomicU64,

    /// Image pixels left at the sentinel because their column was missing
    pub sentinel_pixels: AtomicU64,

    /// Points emitted as NaN (no return or missing column)
    pub invalid_points: AtomicU64,

    /// IMU samples with non-finite components
    pub invalid_imu: AtomicU64,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_skipped_columns(&self, n: u64) {
        if n > 0 {
            self.skipped_columns.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn add_sentinel_pixels(&self, n: u64) {
        if n > 0 {
            self.sentinel_pixels.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn add_invalid_points(&self, n: u64) {
        if n > 0 {
            self.invalid_points.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_invalid_imu(&self) {
        self.invalid_imu.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorStats {
        ProcessorStats {
            skipped_columns: self.skipped_columns.load(Ordering::Relaxed),
            sentinel_pixels: self.sentinel_pixels.load(Ordering::Relaxed),
            invalid_points: self.invalid_points.load(Ordering::Relaxed),
            invalid_imu: self.invalid_imu.load(Ordering::Relaxed),
        }
    }
}

/// Processor counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub skipped_columns: u64,
    pub sentinel_pixels: u64,
    pub invalid_points: u64,
    pub invalid_imu: u64,
}
