//! # Ingestion
//!
//! Sensor packet acquisition.
//!
//! Responsibilities:
//! - Own the sensor sockets and run the handshake (`Os1Sensor`)
//! - Decode the OS-1 UDP wire format into `RawColumn` / `ImuSample`
//! - Drop and count malformed datagrams, never raise them
//! - Reassemble columns into revolutions (`FrameAssembler`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{FrameAssembler, Os1Sensor};
//! use contracts::SensorInterface;
//!
//! let mut sensor = Os1Sensor::new("os1");
//! let metadata = sensor.connect(&config).await?;
//! let mut assembler = FrameAssembler::new(metadata.columns_per_frame());
//!
//! while let Some(column) = sensor.poll_lidar() {
//!     if let Some(frame) = assembler.ingest(column) {
//!         // Process frame
//!     }
//! }
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::MockSensor;
//!
//! let sensor = MockSensor::simulated("sim", 64);
//! ```

mod assembler;
pub mod codec;
mod error;
mod handshake;
mod metrics;
mod mock;
mod os1;

// Re-exports
pub use assembler::{AssemblerMetrics, AssemblerStats, FrameAssembler};
pub use contracts::{SensorInterface, SourceStats};
pub use error::{IngestionError, Result};
pub use handshake::{handshake, HandshakeClient};
pub use metrics::IngestionMetrics;
pub use mock::{MockProbe, MockSensor, MockSensorConfig};
pub use os1::Os1Sensor;
