//! Parameter validation
//!
//! Rules:
//! - lidar_mode is a supported mode
//! - ports are non-zero and lidar/imu ports differ
//! - frame names are non-empty
//! - handshake_timeout_ms > 0
//! - sink names are non-empty and unique, queues non-empty
//! - a file sink's `base_path`, when given, is not blank

use std::collections::HashSet;

use contracts::{ContractError, DriverBlueprint, LidarMode, SinkType};

/// Validate a DriverBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &DriverBlueprint) -> Result<(), ContractError> {
    validate_lidar_mode(blueprint)?;
    validate_ports(blueprint)?;
    validate_frames(blueprint)?;
    validate_timeout(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_lidar_mode(blueprint: &DriverBlueprint) -> Result<(), ContractError> {
    blueprint.driver.lidar_mode.parse::<LidarMode>().map(|_| ())
}

fn validate_ports(blueprint: &DriverBlueprint) -> Result<(), ContractError> {
    let driver = &blueprint.driver;
    for (field, port) in [
        ("driver.lidar_port", driver.lidar_port),
        ("driver.imu_port", driver.imu_port),
        ("driver.tcp_port", driver.tcp_port),
    ] {
        if port == 0 {
            return Err(ContractError::config_validation(
                field,
                "port must be > 0",
            ));
        }
    }

    if driver.lidar_port == driver.imu_port {
        return Err(ContractError::config_validation(
            "driver.lidar_port / driver.imu_port",
            format!(
                "lidar and imu data cannot share port {}",
                driver.lidar_port
            ),
        ));
    }
    Ok(())
}

fn validate_frames(blueprint: &DriverBlueprint) -> Result<(), ContractError> {
    let driver = &blueprint.driver;
    for (field, value) in [
        ("driver.sensor_frame", &driver.sensor_frame),
        ("driver.laser_frame", &driver.laser_frame),
        ("driver.imu_frame", &driver.imu_frame),
    ] {
        if value.trim().is_empty() {
            return Err(ContractError::config_validation(
                field,
                "frame name cannot be empty",
            ));
        }
    }
    Ok(())
}

fn validate_timeout(blueprint: &DriverBlueprint) -> Result<(), ContractError> {
    if blueprint.driver.handshake_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "driver.handshake_timeout_ms",
            "handshake_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// Validate sink configuration
fn validate_sinks(blueprint: &DriverBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
        if sink.sink_type == SinkType::File
            && sink
                .params
                .get("base_path")
                .is_some_and(|p| p.trim().is_empty())
        {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.base_path", sink.name),
                "base_path cannot be blank",
            ));
        }
    }
    Ok(())
}
