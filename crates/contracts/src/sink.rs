//! Publish collaborator traits

use crate::{ContractError, DriverMessage, TransformStamped};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one published product
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, message: &DriverMessage) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

/// Static coordinate-frame announcement
pub trait TransformBroadcaster: Send + Sync {
    /// Announce transforms that hold for the lifetime of the connection
    fn send_static_transforms(&self, transforms: &[TransformStamped]) -> Result<(), ContractError>;
}
