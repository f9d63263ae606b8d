//! # Dispatcher
//!
//! Publish collaborators of the driver.
//!
//! Responsibilities:
//! - Fan each product out to the sinks subscribed to its topic
//! - Gate publishing on the lifecycle (armed only while active)
//! - Isolate slow sinks: best effort, drops counted, never blocks the caller
//! - Announce static coordinate frames

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod tf;

pub use contracts::{DataSink, DriverMessage, TransformBroadcaster};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherStats};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink, MemorySink, MemorySinkReader};
pub use tf::{LogTransformBroadcaster, RecordingTransformBroadcaster};
