//! Sensor metadata - handshake output
//!
//! Calibration and identity data read from the sensor. A [`Metadata`] value is
//! never mutated once built; a reset produces a new one.

use serde::{Deserialize, Serialize};

use crate::{ContractError, LidarMode};

/// 4x4 row-major homogeneous transform, translation in millimetres
pub type TransformMatrix = [f64; 16];

/// Identity matrix
pub const IDENTITY_MATRIX: TransformMatrix = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Reply to `get_sensor_info`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorInfo {
    #[serde(default)]
    pub prod_line: String,
    #[serde(default)]
    pub prod_sn: String,
    #[serde(default)]
    pub build_rev: String,
    #[serde(default)]
    pub status: String,
}

/// Reply to `get_beam_intrinsics`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeamIntrinsics {
    /// Elevation of each beam (degrees), index = beam
    pub beam_altitude_angles: Vec<f64>,
    /// Azimuth offset of each beam (degrees), index = beam
    pub beam_azimuth_angles: Vec<f64>,
}

impl BeamIntrinsics {
    pub fn beams(&self) -> usize {
        self.beam_altitude_angles.len()
    }
}

/// Reply to `get_imu_intrinsics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuIntrinsics {
    pub imu_to_sensor_transform: TransformMatrix,
}

/// Reply to `get_lidar_intrinsics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarIntrinsics {
    pub lidar_to_sensor_transform: TransformMatrix,
}

/// Calibration snapshot of one connected sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Sensor hostname or address as configured
    pub hostname: String,
    pub sensor_info: SensorInfo,
    pub lidar_mode: LidarMode,
    pub lidar_port: u16,
    pub imu_port: u16,
    pub beam_intrinsics: BeamIntrinsics,
    pub imu_to_sensor_transform: TransformMatrix,
    pub lidar_to_sensor_transform: TransformMatrix,
}

impl Metadata {
    /// Number of beams (rows of every image)
    pub fn beams(&self) -> usize {
        self.beam_intrinsics.beams()
    }

    /// Columns per frame for the configured mode
    pub fn columns_per_frame(&self) -> usize {
        self.lidar_mode.columns_per_frame()
    }

    /// Check the beam tables are usable for geometry
    pub fn validate(&self) -> Result<(), ContractError> {
        let beams = &self.beam_intrinsics;
        if beams.beam_altitude_angles.is_empty() {
            return Err(ContractError::payload_parse("beam intrinsics are empty"));
        }
        if beams.beam_altitude_angles.len() != beams.beam_azimuth_angles.len() {
            return Err(ContractError::payload_parse(format!(
                "beam intrinsics mismatch: {} altitude angles, {} azimuth angles",
                beams.beam_altitude_angles.len(),
                beams.beam_azimuth_angles.len()
            )));
        }
        Ok(())
    }

    /// Calibration of an OS-1 with evenly spread beams.
    ///
    /// Used by the simulated sensor; the transforms are the OS-1 factory values.
    pub fn synthetic(
        hostname: impl Into<String>,
        lidar_mode: LidarMode,
        beams: usize,
        lidar_port: u16,
        imu_port: u16,
    ) -> Self {
        let span = 33.2_f64;
        let beam_altitude_angles = (0..beams)
            .map(|b| {
                if beams > 1 {
                    span / 2.0 - span * b as f64 / (beams - 1) as f64
                } else {
                    0.0
                }
            })
            .collect();
        let beam_azimuth_angles = (0..beams)
            .map(|b| if b % 2 == 0 { 3.1 } else { -1.0 })
            .collect();

        Self {
            hostname: hostname.into(),
            sensor_info: SensorInfo {
                prod_line: "OS-1-64".into(),
                prod_sn: "000000000000".into(),
                build_rev: "v1.13.0".into(),
                status: "RUNNING".into(),
            },
            lidar_mode,
            lidar_port,
            imu_port,
            beam_intrinsics: BeamIntrinsics {
                beam_altitude_angles,
                beam_azimuth_angles,
            },
            imu_to_sensor_transform: [
                1.0, 0.0, 0.0, 6.253, //
                0.0, 1.0, 0.0, -11.775, //
                0.0, 0.0, 1.0, 7.645, //
                0.0, 0.0, 0.0, 1.0,
            ],
            lidar_to_sensor_transform: [
                -1.0, 0.0, 0.0, 0.0, //
                0.0, -1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 36.18, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }
}
