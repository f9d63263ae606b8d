//! FrameAssembler - columns to revolutions
//!
//! A revolution ends when the azimuth index wraps around: it goes backwards or
//! hits the starting index again. Short revolutions are still emitted and
//! tagged incomplete. A column repeating the previous index (duplicated
//! datagram) is dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{Frame, RawColumn};
use tracing::debug;

/// Assembler counters
#[derive(Debug, Default)]
pub struct AssemblerMetrics {
    pub columns_ingested: AtomicU64,
    pub frames_emitted: AtomicU64,
    pub incomplete_frames: AtomicU64,
    /// Columns whose timestamp went backwards within a frame (still appended)
    pub backwards_timestamps: AtomicU64,
    /// Columns dropped for repeating the previous azimuth index
    pub duplicate_columns: AtomicU64,
}

impl AssemblerMetrics {
    pub fn snapshot(&self) -> AssemblerStats {
        AssemblerStats {
            columns_ingested: self.columns_ingested.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            incomplete_frames: self.incomplete_frames.load(Ordering::Relaxed),
            backwards_timestamps: self.backwards_timestamps.load(Ordering::Relaxed),
            duplicate_columns: self.duplicate_columns.load(Ordering::Relaxed),
        }
    }
}

/// Assembler counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub columns_ingested: u64,
    pub frames_emitted: u64,
    pub incomplete_frames: u64,
    pub backwards_timestamps: u64,
    pub duplicate_columns: u64,
}

/// Accumulates columns into frames
pub struct FrameAssembler {
    columns_per_frame: usize,
    start_index: u16,
    buffer: Vec<RawColumn>,
    spare: Option<Vec<RawColumn>>,
    previous_index: Option<u16>,
    next_id: u64,
    metrics: Arc<AssemblerMetrics>,
}

impl FrameAssembler {
    pub fn new(columns_per_frame: usize) -> Self {
        Self::with_metrics(columns_per_frame, Arc::new(AssemblerMetrics::default()))
    }

    /// Assembler reporting into existing counters
    pub fn with_metrics(columns_per_frame: usize, metrics: Arc<AssemblerMetrics>) -> Self {
        Self {
            columns_per_frame,
            start_index: 0,
            buffer: Vec::with_capacity(columns_per_frame),
            spare: None,
            previous_index: None,
            next_id: 0,
            metrics,
        }
    }

    /// Azimuth index a revolution starts at (default 0)
    pub fn with_start_index(mut self, start_index: u16) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn columns_per_frame(&self) -> usize {
        self.columns_per_frame
    }

    /// Columns accumulated in the current revolution
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn metrics(&self) -> Arc<AssemblerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Add a column; returns the finished frame when this column starts a new revolution
    pub fn ingest(&mut self, column: RawColumn) -> Option<Frame> {
        self.metrics.columns_ingested.fetch_add(1, Ordering::Relaxed);

        let index = column.measurement_id;
        if self.previous_index == Some(index) {
            self.metrics.duplicate_columns.fetch_add(1, Ordering::Relaxed);
            debug!(index, "duplicate column dropped");
            return None;
        }
        let wrapped = index == self.start_index
            || self.previous_index.is_some_and(|previous| index < previous);
        self.previous_index = Some(index);

        let frame = if wrapped { self.emit() } else { None };

        if let Some(last) = self.buffer.last() {
            if column.timestamp_ns < last.timestamp_ns {
                self.metrics
                    .backwards_timestamps
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
        self.buffer.push(column);
        frame
    }

    /// Emit whatever has been accumulated (end of stream)
    pub fn flush(&mut self) -> Option<Frame> {
        self.previous_index = None;
        self.emit()
    }

    /// Drop the partial revolution (column indices restart after a sensor reset)
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.previous_index = None;
    }

    /// Change the revolution width (lidar mode change); drops the partial revolution
    pub fn resize(&mut self, columns_per_frame: usize) {
        self.clear();
        self.spare = None;
        self.columns_per_frame = columns_per_frame;
    }

    /// Hand a spent frame back so its allocation is reused
    pub fn recycle(&mut self, frame: Frame) {
        let mut columns = frame.columns;
        columns.clear();
        if columns.capacity() >= self.buffer.capacity() {
            self.spare = Some(columns);
        }
    }

    fn emit(&mut self) -> Option<Frame> {
        if self.buffer.is_empty() {
            return None;
        }
        let next = self
            .spare
            .take()
            .unwrap_or_else(|| Vec::with_capacity(self.columns_per_frame));
        let columns = std::mem::replace(&mut self.buffer, next);

        let frame = Frame {
            id: self.next_id,
            columns,
            expected_columns: self.columns_per_frame,
        };
        self.next_id += 1;

        self.metrics.frames_emitted.fetch_add(1, Ordering::Relaxed);
        if !frame.is_complete() {
            self.metrics
                .incomplete_frames
                .fetch_add(1, Ordering::Relaxed);
            debug!(
                frame_id = frame.id,
                columns = frame.len(),
                expected = self.columns_per_frame,
                "incomplete frame"
            );
        }
        Some(frame)
    }
}
