//! Layered error definitions
//!
//! Categorized by source: config / sensor / payload / sink

use thiserror::Error;

/// Errors shared by every driver crate
#[derive(Debug, Error)]
pub enum ContractError {
    /// Parameter file is not valid TOML or JSON
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A parameter holds a value the driver cannot use
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// A parameter without default was not provided.
    ///
    /// The driver cannot run without a sensor and host address, so this is
    /// the one fatal error of the taxonomy.
    #[error("required parameter '{field}' is not set: an IP address or hostname is required for both the lidar and the computer")]
    MissingParameter { field: String },

    /// Socket bind or TCP connection failure
    #[error("sensor connection error ({host}): {message}")]
    SensorConnection { host: String, message: String },

    /// Sensor rejected or garbled a handshake command
    #[error("handshake error on '{command}': {message}")]
    Handshake { command: String, message: String },

    /// Datagram could not be decoded
    #[error("payload parse error: {message}")]
    PayloadParse { message: String },

    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink creation error
    #[error("sink '{sink_name}' creation error: {message}")]
    SinkCreation { sink_name: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything without a better category
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Parameter file could not be parsed
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Parameter value out of range or unknown
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_parameter(field: impl Into<String>) -> Self {
        Self::MissingParameter {
            field: field.into(),
        }
    }

    pub fn sensor_connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SensorConnection {
            host: host.into(),
            message: message.into(),
        }
    }

    pub fn handshake(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handshake {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn payload_parse(message: impl Into<String>) -> Self {
        Self::PayloadParse {
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_creation(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the host process must terminate instead of retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingParameter { .. })
    }

    /// Whether the error came from talking to the sensor.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::SensorConnection { .. } | Self::Handshake { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_is_fatal() {
        let err = ContractError::missing_parameter("lidar_ip");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("lidar_ip"));
    }

    #[test]
    fn test_connection_errors_are_not_fatal() {
        let err = ContractError::sensor_connection("10.5.5.86", "refused");
        assert!(!err.is_fatal());
        assert!(err.is_connection());

        let err = ContractError::handshake("reinitialize", "unexpected reply");
        assert!(err.is_connection());
        assert!(!ContractError::payload_parse("short").is_connection());
    }
}
