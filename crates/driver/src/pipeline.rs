//! Cycle body: packet source → assembler → processors → publishers

use std::sync::Arc;

use contracts::{Frame, FrameNames, Header, ImuSample, Metadata, SensorInterface, Timestamp};
use dispatcher::Dispatcher;
use ingestion::{AssemblerMetrics, FrameAssembler};
use processing::{frame_processors, FrameProcessor, ImuProcessor, ProcessorMetrics};
use tracing::{debug, trace};

use crate::metrics::DriverMetrics;

/// State carried from one cycle to the next
pub(crate) struct Pipeline {
    assembler: FrameAssembler,
    processors: Vec<Box<dyn FrameProcessor>>,
    imu: ImuProcessor,
    dispatcher: Arc<Dispatcher>,
    frames: FrameNames,
    metrics: Arc<DriverMetrics>,
    columns_per_cycle: usize,
    /// Metadata the assembler was sized for
    metadata: Option<Arc<Metadata>>,
    imu_seq: u64,
}

impl Pipeline {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher>,
        frames: FrameNames,
        processor_metrics: &Arc<ProcessorMetrics>,
        assembler_metrics: Arc<AssemblerMetrics>,
        metrics: Arc<DriverMetrics>,
        columns_per_cycle: usize,
    ) -> Self {
        Self {
            assembler: FrameAssembler::with_metrics(0, assembler_metrics),
            processors: frame_processors(processor_metrics),
            imu: ImuProcessor::new(Arc::clone(processor_metrics)),
            dispatcher,
            frames,
            metrics,
            columns_per_cycle,
            metadata: None,
            imu_seq: 0,
        }
    }

    /// One cycle. Drains at most `columns_per_cycle` columns and one IMU
    /// datagram; never waits on I/O.
    ///
    /// The sensor packs 16 columns into each lidar datagram, so the default
    /// of 16 columns per cycle means one datagram per cycle. Taking a single
    /// column per cycle would fall behind the datagram rate by a factor of 16.
    pub(crate) fn process_data(
        &mut self,
        sensor: &mut dyn SensorInterface,
        metadata: Option<Arc<Metadata>>,
    ) {
        let Some(metadata) = metadata else {
            return;
        };
        self.track_metadata(&metadata);

        for _ in 0..self.columns_per_cycle {
            let Some(column) = sensor.poll_lidar() else {
                break;
            };
            if let Some(frame) = self.assembler.ingest(column) {
                self.publish_frame(frame, &metadata);
            }
        }

        if let Some(sample) = sensor.poll_imu() {
            self.publish_imu(&sample, &metadata);
        }
    }

    /// A reset may change the mode and restarts measurement ids
    fn track_metadata(&mut self, metadata: &Arc<Metadata>) {
        if let Some(current) = &self.metadata {
            if Arc::ptr_eq(current, metadata) {
                return;
            }
        }
        let columns = metadata.columns_per_frame();
        if columns != self.assembler.columns_per_frame() {
            debug!(columns, mode = %metadata.lidar_mode, "resizing frame assembler");
            self.assembler.resize(columns);
        } else {
            self.assembler.clear();
        }
        self.metadata = Some(Arc::clone(metadata));
    }

    fn publish_frame(&mut self, frame: Frame, metadata: &Metadata) {
        let header = Header {
            stamp: Timestamp::from_nanos(frame.timestamp_ns()),
            frame_id: self.frames.laser_frame.clone(),
            seq: frame.id,
        };
        let complete = frame.is_complete();

        for processor in &self.processors {
            let topic = processor.topic();
            if !self.dispatcher.has_subscribers(topic) {
                continue;
            }
            let delivered = self
                .dispatcher
                .publish(processor.process(&frame, metadata, &header));
            observability::record_message_published(topic, delivered);
        }

        trace!(frame_id = frame.id, columns = frame.len(), "frame published");
        self.metrics
            .record_frame(frame.timestamp_ns(), frame.len(), complete);
        observability::record_frame_published(frame.id, frame.len(), complete);
        self.assembler.recycle(frame);
    }

    fn publish_imu(&mut self, sample: &ImuSample, metadata: &Metadata) {
        let header = Header {
            stamp: Timestamp::default(),
            frame_id: self.frames.imu_frame.clone(),
            seq: self.imu_seq,
        };
        self.imu_seq += 1;

        let message = self.imu.process(sample, metadata, &header);
        let delivered = self.dispatcher.publish(message);
        self.metrics.record_imu();
        observability::record_message_published(contracts::Topic::Imu, delivered);
    }
}
