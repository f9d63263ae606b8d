//! Cycle counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use contracts::SourceStats;
use dispatcher::DispatcherStats;
use ingestion::AssemblerStats;
use observability::{FrameStatsAggregator, MetricsSummary};
use processing::ProcessorStats;

use crate::state::LifecycleState;

/// Counters shared by the cycle task and the services
#[derive(Debug, Default)]
pub struct DriverMetrics {
    cycles: AtomicU64,
    skipped_cycles: AtomicU64,
    frames_published: AtomicU64,
    incomplete_frames: AtomicU64,
    imu_published: AtomicU64,
    resets: AtomicU64,
    failed_resets: AtomicU64,
    frames: Mutex<FrameStatsAggregator>,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cycle count including this one
    pub fn record_cycle(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_skipped_cycle(&self) {
        self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
        observability::record_cycle_skipped();
    }

    pub fn record_frame(&self, stamp_ns: u64, columns: usize, complete: bool) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        if !complete {
            self.incomplete_frames.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut frames) = self.frames.lock() {
            frames.update(stamp_ns, columns, complete);
        }
    }

    pub fn record_imu(&self) {
        self.imu_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self, success: bool) {
        if success {
            self.resets.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_resets.fetch_add(1, Ordering::Relaxed);
        }
        observability::record_reset(success);
    }

    pub fn snapshot(&self) -> CycleStats {
        CycleStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            skipped_cycles: self.skipped_cycles.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            incomplete_frames: self.incomplete_frames.load(Ordering::Relaxed),
            imu_published: self.imu_published.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            failed_resets: self.failed_resets.load(Ordering::Relaxed),
        }
    }

    /// Frame timing since the controller was built
    pub fn frame_summary(&self) -> MetricsSummary {
        self.frames
            .lock()
            .map(|frames| frames.summary())
            .unwrap_or_default()
    }
}

/// Snapshot of [`DriverMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    /// Cycles that found the sensor busy with a reset
    pub skipped_cycles: u64,
    pub frames_published: u64,
    pub incomplete_frames: u64,
    pub imu_published: u64,
    pub resets: u64,
    pub failed_resets: u64,
}

/// Everything the driver counts, gathered in one place
#[derive(Debug, Clone, Default)]
pub struct DriverStats {
    pub state: LifecycleState,
    pub cycle: CycleStats,
    /// `None` while no sensor is held, or while a reset holds it
    pub source: Option<SourceStats>,
    pub assembler: AssemblerStats,
    pub processors: ProcessorStats,
    /// `None` while unconfigured
    pub dispatcher: Option<DispatcherStats>,
    pub frames: MetricsSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_summary_tracks_intervals() {
        let metrics = DriverMetrics::new();
        metrics.record_frame(0, 512, true);
        metrics.record_frame(100_000_000, 512, true);
        metrics.record_frame(200_000_000, 300, false);

        let cycle = metrics.snapshot();
        assert_eq!(cycle.frames_published, 3);
        assert_eq!(cycle.incomplete_frames, 1);

        let summary = metrics.frame_summary();
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.frame_interval_ms.count, 2);
        assert!((summary.frame_interval_ms.mean - 100.0).abs() < 1e-9);
        assert_eq!(summary.columns.max, 512.0);
    }

    #[test]
    fn test_resets_split_by_outcome() {
        let metrics = DriverMetrics::new();
        metrics.record_reset(true);
        metrics.record_reset(false);
        metrics.record_reset(true);
        let cycle = metrics.snapshot();
        assert_eq!((cycle.resets, cycle.failed_resets), (2, 1));
    }
}
