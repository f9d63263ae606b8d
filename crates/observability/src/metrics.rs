//! Driver metric helpers
//!
//! Thin wrappers over the `metrics` macros so the rest of the workspace never
//! spells metric names itself. Every helper is a no-op until a recorder is
//! installed (see [`crate::init_with_config`]).

use contracts::{SourceStats, Topic};
use metrics::{counter, gauge, histogram};

/// Record one published frame
pub fn record_frame_published(frame_id: u64, columns: usize, complete: bool) {
    counter!("ouster_driver_frames_total").increment(1);
    gauge!("ouster_driver_last_frame_id").set(frame_id as f64);
    histogram!("ouster_driver_frame_columns").record(columns as f64);
    if !complete {
        counter!("ouster_driver_incomplete_frames_total").increment(1);
    }
}

/// Record one product handed to the publishers
pub fn record_message_published(topic: Topic, subscribers: usize) {
    counter!(
        "ouster_driver_messages_published_total",
        "topic" => topic.as_str()
    )
    .increment(1);
    if subscribers == 0 {
        counter!(
            "ouster_driver_messages_unsubscribed_total",
            "topic" => topic.as_str()
        )
        .increment(1);
    }
}

/// Record a cycle that found the sensor busy (reset in progress)
pub fn record_cycle_skipped() {
    counter!("ouster_driver_cycles_skipped_total").increment(1);
}

/// Record cycle processing time
pub fn record_cycle_duration_us(duration_us: f64) {
    histogram!("ouster_driver_cycle_duration_us").record(duration_us);
}

/// Record a lifecycle transition
pub fn record_transition(transition: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ouster_driver_transitions_total",
        "transition" => transition.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record the outcome of a reset request
pub fn record_reset(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("ouster_driver_resets_total", "status" => status).increment(1);
}

/// Mirror packet source counters into gauges
pub fn record_source_stats(sensor_id: &str, stats: &SourceStats) {
    let sensor_id = sensor_id.to_string();
    gauge!("ouster_driver_datagrams_received", "sensor_id" => sensor_id.clone())
        .set(stats.datagrams_received as f64);
    gauge!("ouster_driver_datagrams_dropped", "sensor_id" => sensor_id.clone())
        .set(stats.datagrams_dropped as f64);
    gauge!("ouster_driver_invalid_columns", "sensor_id" => sensor_id.clone())
        .set(stats.invalid_columns as f64);
    gauge!("ouster_driver_imu_received", "sensor_id" => sensor_id.clone())
        .set(stats.imu_received as f64);
    gauge!("ouster_driver_imu_dropped", "sensor_id" => sensor_id).set(stats.imu_dropped as f64);
}

/// In-memory aggregation of frame timing, for run summaries
#[derive(Debug, Clone, Default)]
pub struct FrameStatsAggregator {
    pub total_frames: u64,
    pub incomplete_frames: u64,
    /// Interval between consecutive frame stamps (ms)
    pub frame_interval_ms: RunningStats,
    /// Columns per emitted frame
    pub columns: RunningStats,
    last_stamp_ns: Option<u64>,
}

impl FrameStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, stamp_ns: u64, columns: usize, complete: bool) {
        self.total_frames += 1;
        if !complete {
            self.incomplete_frames += 1;
        }
        self.columns.push(columns as f64);
        if let Some(last) = self.last_stamp_ns {
            if stamp_ns > last {
                self.frame_interval_ms.push((stamp_ns - last) as f64 / 1e6);
            }
        }
        self.last_stamp_ns = Some(stamp_ns);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            incomplete_frames: self.incomplete_frames,
            incomplete_rate: if self.total_frames > 0 {
                self.incomplete_frames as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            frame_interval_ms: StatsSummary::from(&self.frame_interval_ms),
            columns: StatsSummary::from(&self.columns),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Aggregated frame summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub incomplete_frames: u64,
    pub incomplete_rate: f64,
    pub frame_interval_ms: StatsSummary,
    pub columns: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Frame Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(
            f,
            "Incomplete frames: {} ({:.2}%)",
            self.incomplete_frames, self.incomplete_rate
        )?;
        writeln!(f, "Frame interval (ms): {}", self.frame_interval_ms)?;
        writeln!(f, "Columns per frame: {}", self.columns)?;
        Ok(())
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
