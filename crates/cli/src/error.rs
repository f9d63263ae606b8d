//! Error types for CLI operations.

use std::process::ExitCode;

use driver::{DriverError, LifecycleState};
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Parameter file not found
    #[error("Parameter file not found: {path}")]
    ConfigNotFound { path: String },

    /// The driver left Active on its own
    #[error("Driver stopped in state {state}")]
    DriverStopped { state: LifecycleState },

    /// Configured, but no metadata to report
    #[error("Sensor returned no metadata")]
    MetadataUnavailable,
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Whether any cause in the chain is a fatal configuration error
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<DriverError>()
            .is_some_and(DriverError::is_fatal)
            || cause
                .downcast_ref::<contracts::ContractError>()
                .is_some_and(contracts::ContractError::is_fatal)
    })
}

/// Exit status for a failed command: 2 for fatal configuration errors, 1 otherwise
pub fn exit_code(err: &anyhow::Error) -> ExitCode {
    if is_fatal(err) {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use contracts::ContractError;

    #[test]
    fn test_missing_parameter_is_fatal() {
        let err: anyhow::Result<()> = Err(DriverError::from(ContractError::missing_parameter(
            "lidar_ip",
        )))
        .context("configure failed");
        assert!(is_fatal(&err.unwrap_err()));

        let err = anyhow::Error::from(ContractError::missing_parameter("computer_ip"));
        assert!(is_fatal(&err));
    }

    #[test]
    fn test_connection_failure_is_not_fatal() {
        let err = anyhow::Error::from(DriverError::from(ContractError::sensor_connection(
            "10.5.5.86",
            "refused",
        )));
        assert!(!is_fatal(&err));
        assert!(!is_fatal(&anyhow::Error::from(CliError::MetadataUnavailable)));
    }
}
