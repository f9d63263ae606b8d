//! Dispatcher - lifecycle-gated fan-out to sinks
//!
//! The periodic cycle calls [`Dispatcher::publish`] synchronously; each sink
//! has its own bounded queue, so a slow sink only ever loses its own samples.
//! While disarmed every publish is suppressed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, instrument};

use contracts::{DriverMessage, SinkConfig, SinkType, Topic};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink};

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    sinks: Vec<SinkConfig>,
    handles: Vec<SinkHandle>,
}

impl DispatcherBuilder {
    pub fn new(sinks: Vec<SinkConfig>) -> Self {
        Self {
            sinks,
            handles: Vec::new(),
        }
    }

    /// Add an already spawned sink (in-process consumers, tests)
    pub fn with_handle(mut self, handle: SinkHandle) -> Self {
        self.handles.push(handle);
        self
    }

    /// Spawn the configured sinks; requires a tokio runtime
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.sinks.len() + self.handles.len())
    )]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = self.handles;
        for sink_config in &self.sinks {
            handles.push(create_sink_handle(sink_config)?);
        }
        Ok(Dispatcher::with_handles(handles))
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn_for_topics(
                sink,
                config.queue_capacity,
                config.topics.clone(),
            ))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn_for_topics(
                sink,
                config.queue_capacity,
                config.topics.clone(),
            ))
        }
    }
}

/// Publish counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Messages handed to at least one sink queue
    pub published: u64,
    /// Messages offered while disarmed
    pub suppressed: u64,
    /// Samples missed by full sink queues, all sinks together
    pub dropped: u64,
}

/// Fan-out to the sinks subscribed to each topic
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    armed: AtomicBool,
    published: AtomicU64,
    suppressed: AtomicU64,
}

impl Dispatcher {
    /// Create a disarmed dispatcher over spawned sink handles
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self {
            handles,
            armed: AtomicBool::new(false),
            published: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
        debug!(sinks = self.handles.len(), "Publishers armed");
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
        debug!(sinks = self.handles.len(), "Publishers disarmed");
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Whether any sink subscribes to `topic`
    pub fn has_subscribers(&self, topic: Topic) -> bool {
        self.handles.iter().any(|h| h.accepts(topic))
    }

    /// Offer a message to every subscribed sink; never waits.
    ///
    /// Returns the number of sinks that accepted it.
    pub fn publish(&self, message: DriverMessage) -> usize {
        if !self.is_armed() {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return 0;
        }

        let topic = message.topic();
        let accepted = self
            .handles
            .iter()
            .filter(|h| h.accepts(topic))
            .filter(|h| h.try_send(message.clone()))
            .count();
        if accepted > 0 {
            self.published.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            published: self.published.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            dropped: self.handles.iter().map(|h| h.metrics().dropped()).sum(),
        }
    }

    /// Stop every sink worker after it drains its queue
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let stats = self.stats();
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!(
            published = stats.published,
            suppressed = stats.suppressed,
            dropped = stats.dropped,
            "Dispatcher shutdown complete"
        );
    }
}

/// Convenience function to create a dispatcher from sink configs
pub fn create_dispatcher(sink_configs: Vec<SinkConfig>) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(sink_configs).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::{imu_message, MockSink};
    use crate::sinks::MemorySink;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_disarmed_publishes_nothing() {
        let (sink, reader) = MemorySink::new("mem");
        let dispatcher = Dispatcher::with_handles(vec![SinkHandle::spawn(sink, 10)]);

        assert_eq!(dispatcher.publish(imu_message(1)), 0);
        dispatcher.arm();
        assert_eq!(dispatcher.publish(imu_message(2)), 1);
        dispatcher.disarm();
        assert_eq!(dispatcher.publish(imu_message(3)), 0);

        let stats = dispatcher.stats();
        dispatcher.shutdown().await;
        assert_eq!(stats.published, 1);
        assert_eq!(stats.suppressed, 2);
        let seqs: Vec<u64> = reader.messages().iter().map(|m| m.header().seq).collect();
        assert_eq!(seqs, vec![2]);
    }

    #[tokio::test]
    async fn test_fanout_by_topic() {
        let imu_count = Arc::new(AtomicU64::new(0));
        let points_count = Arc::new(AtomicU64::new(0));
        let imu_sink = MockSink {
            name: "imu".into(),
            write_count: Arc::clone(&imu_count),
            should_fail: false,
            delay_ms: 0,
        };
        let points_sink = MockSink {
            name: "points".into(),
            write_count: Arc::clone(&points_count),
            should_fail: false,
            delay_ms: 0,
        };

        let dispatcher = DispatcherBuilder::new(Vec::new())
            .with_handle(SinkHandle::spawn_for_topics(imu_sink, 10, vec![Topic::Imu]))
            .with_handle(SinkHandle::spawn_for_topics(points_sink, 10, vec![Topic::Points]))
            .build()
            .unwrap();
        dispatcher.arm();

        for i in 0..5 {
            assert_eq!(dispatcher.publish(imu_message(i)), 1);
        }
        assert!(dispatcher.has_subscribers(Topic::Points));
        assert!(!dispatcher.has_subscribers(Topic::NoiseImage));

        dispatcher.shutdown().await;
        assert_eq!(imu_count.load(Ordering::Relaxed), 5);
        assert_eq!(points_count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_create_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let configs = vec![
            SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                topics: vec![],
                queue_capacity: 8,
                params: Default::default(),
            },
            SinkConfig {
                name: "file".into(),
                sink_type: SinkType::File,
                topics: vec![Topic::Imu],
                queue_capacity: 8,
                params: [(
                    "base_path".to_string(),
                    dir.path().to_string_lossy().to_string(),
                )]
                .into_iter()
                .collect(),
            },
        ];
        let dispatcher = create_dispatcher(configs).unwrap();
        dispatcher.arm();
        assert_eq!(dispatcher.publish(imu_message(4)), 2);
        dispatcher.shutdown().await;

        assert!(dir.path().join("imu").join("000004.json").exists());
    }

    #[tokio::test]
    async fn test_file_sink_over_regular_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = SinkConfig {
            name: "blocked".into(),
            sink_type: SinkType::File,
            topics: vec![],
            queue_capacity: 8,
            params: [(
                "base_path".to_string(),
                file.path().to_string_lossy().to_string(),
            )]
            .into_iter()
            .collect(),
        };

        let err = create_dispatcher(vec![config]).err().unwrap();
        assert_eq!(err.sink_name(), "blocked");
        assert!(matches!(
            contracts::ContractError::from(err),
            contracts::ContractError::SinkCreation { .. }
        ));
    }
}
