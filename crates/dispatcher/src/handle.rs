//! SinkHandle - one sink behind a bounded queue drained by its own task
//!
//! Publishing never waits: when the queue is full the sample is dropped and
//! counted against its topic.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use contracts::{DataSink, DriverMessage, Topic};

use crate::metrics::SinkMetrics;

/// Publisher side of one sink
pub struct SinkHandle {
    name: String,
    /// Subscribed topics, empty = all
    topics: Vec<Topic>,
    queue: mpsc::Sender<DriverMessage>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task for `sink`, subscribed to every topic
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        Self::spawn_for_topics(sink, queue_capacity, Vec::new())
    }

    /// Spawn the worker task for `sink`, subscribed to `topics` (empty = all)
    pub fn spawn_for_topics<S: DataSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        topics: Vec<Topic>,
    ) -> Self {
        let name = sink.name().to_string();
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());
        let worker = tokio::spawn(drain(sink, rx, Arc::clone(&metrics), name.clone()));

        Self {
            name,
            topics,
            queue,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Whether this sink subscribes to `topic`
    pub fn accepts(&self, topic: Topic) -> bool {
        self.topics.is_empty() || self.topics.contains(&topic)
    }

    /// Offer a message; false when it was dropped (queue full or worker gone)
    pub fn try_send(&self, message: DriverMessage) -> bool {
        match self.queue.try_send(message) {
            Ok(()) => {
                self.metrics
                    .set_queue_depth(self.queue.max_capacity() - self.queue.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(missed)) => {
                self.metrics.record_dropped(missed.topic());
                trace!(
                    sink = %self.name,
                    topic = %missed.topic(),
                    seq = missed.header().seq,
                    "queue full, sample missed"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "sink worker gone");
                false
            }
        }
    }

    /// Close the queue and wait until everything queued has been written
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
        debug!(
            sink = %self.name,
            written = self.metrics.written(),
            dropped = self.metrics.dropped(),
            "sink drained"
        );
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn drain<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<DriverMessage>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "sink worker started");

    while let Some(message) = rx.recv().await {
        metrics.set_queue_depth(rx.len());

        match sink.write(&message).await {
            Ok(()) => metrics.record_written(message.header().seq),
            Err(e) => {
                // Keep draining; the next sample may succeed
                metrics.record_failed();
                error!(
                    sink = %name,
                    topic = %message.topic(),
                    seq = message.header().seq,
                    error = %e,
                    "write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close failed on shutdown");
    }
    debug!(sink = %name, "sink worker stopped");
}
