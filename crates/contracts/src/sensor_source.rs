//! SensorInterface trait - packet source abstraction
//!
//! One variant per sensor family; the lifecycle controller only sees this trait.
//! Connect and reset talk to the sensor and are async, polling never blocks.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{Configuration, ContractError, ImuSample, Metadata, RawColumn};

/// Boxed future returned by the async trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Packet source counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub datagrams_received: u64,
    /// Malformed or truncated lidar datagrams
    pub datagrams_dropped: u64,
    pub columns_decoded: u64,
    /// Columns whose status word flagged them invalid
    pub invalid_columns: u64,
    pub imu_received: u64,
    pub imu_dropped: u64,
}

/// Sensor handle
pub trait SensorInterface: Send {
    /// Sensor name (used for logging)
    fn name(&self) -> &str;

    /// Bind the data sockets and run the handshake.
    ///
    /// # Errors
    /// `SensorConnection` / `Handshake` when the sensor cannot be reached or configured
    fn connect<'a>(
        &'a mut self,
        config: &'a Configuration,
    ) -> BoxFuture<'a, Result<Metadata, ContractError>>;

    /// Re-run the handshake with a new configuration.
    ///
    /// The previous connection and metadata stay in place unless this succeeds.
    fn reset<'a>(
        &'a mut self,
        config: &'a Configuration,
    ) -> BoxFuture<'a, Result<Metadata, ContractError>>;

    /// Next decoded column, if any. Never blocks.
    fn poll_lidar(&mut self) -> Option<RawColumn>;

    /// Next decoded IMU datagram, if any. Never blocks.
    fn poll_imu(&mut self) -> Option<ImuSample>;

    /// Release the sockets
    fn close(&mut self);

    fn is_connected(&self) -> bool;

    fn stats(&self) -> SourceStats;
}
