//! Service handlers: reset and get_metadata

use std::sync::Arc;

use contracts::{Metadata, Parameters};
use tracing::{debug, info, instrument, warn};

use crate::controller::Shared;
use crate::error::{DriverError, Result};
use crate::state::LifecycleState;

/// Cloneable handle serving requests while the controller runs
#[derive(Clone)]
pub struct ServiceHandle {
    shared: Arc<Shared>,
}

impl ServiceHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    /// Re-handshake with the current parameters and swap the metadata,
    /// staying Active with the cycle running.
    ///
    /// A no-op outside Active. On failure the previous connection and
    /// metadata stay in place and the state does not change.
    #[instrument(name = "service_reset", skip(self))]
    pub async fn reset(&self) -> Result<()> {
        if self.state() != LifecycleState::Active {
            debug!(state = %self.state(), "reset ignored");
            return Ok(());
        }
        let config = self.shared.parameters.load().to_configuration()?;

        // Cycles skip while this is held
        let mut guard = self.shared.sensor.lock().await;
        if self.state() != LifecycleState::Active {
            debug!(state = %self.state(), "reset ignored");
            return Ok(());
        }
        let Some(sensor) = guard.as_mut() else {
            return Ok(());
        };

        let result = match sensor.reset(&config).await {
            Ok(metadata) => metadata.validate().map(|()| metadata),
            Err(e) => Err(e),
        };
        match result {
            Ok(_) if self.state() != LifecycleState::Active => {
                debug!(state = %self.state(), "reset finished after leaving Active, metadata kept");
                Ok(())
            }
            Ok(metadata) => {
                info!(
                    sensor = %sensor.name(),
                    serial = %metadata.sensor_info.prod_sn,
                    mode = %metadata.lidar_mode,
                    "sensor reset"
                );
                self.shared.metadata.store(Some(Arc::new(metadata)));
                self.shared.metrics.record_reset(true);
                Ok(())
            }
            Err(e) => {
                warn!(sensor = %sensor.name(), error = %e, "sensor reset failed");
                self.shared.metrics.record_reset(false);
                Err(e.into())
            }
        }
    }

    /// Snapshot of the current metadata; `None` outside Active
    pub fn get_metadata(&self) -> Option<Arc<Metadata>> {
        if self.state() != LifecycleState::Active {
            return None;
        }
        self.shared.metadata.load_full()
    }

    pub fn parameters(&self) -> Arc<Parameters> {
        self.shared.parameters.load_full()
    }

    /// Replace the parameters; they take effect at the next configure or reset
    pub fn set_parameters(&self, parameters: Parameters) -> Result<()> {
        if self.state() == LifecycleState::Finalized {
            return Err(DriverError::Finalized);
        }
        self.shared.parameters.store(Arc::new(parameters));
        Ok(())
    }
}
