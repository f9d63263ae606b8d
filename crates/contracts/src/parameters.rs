//! Driver parameters - Config Loader output
//!
//! Describes everything the host hands to the driver: sensor addresses, ports,
//! lidar mode, coordinate-frame names and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::ContractError;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete parameter file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Driver parameters
    #[serde(default)]
    pub driver: Parameters,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Driver parameters as declared by the host.
///
/// `lidar_ip` and `computer_ip` have no default: leaving either unset is
/// fatal once [`Parameters::to_configuration`] is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Sensor IP address or hostname
    #[serde(default)]
    pub lidar_ip: Option<String>,

    /// Address the sensor streams UDP data to
    #[serde(default)]
    pub computer_ip: Option<String>,

    /// UDP port for lidar column packets
    #[serde(default = "default_lidar_port")]
    pub lidar_port: u16,

    /// UDP port for IMU packets
    #[serde(default = "default_imu_port")]
    pub imu_port: u16,

    /// Horizontal resolution x rotation rate, e.g. "512x10"
    #[serde(default = "default_lidar_mode")]
    pub lidar_mode: String,

    /// Sensor TCP command port
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    /// Handshake timeout (milliseconds)
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Coordinate frame of the sensor housing
    #[serde(default = "default_sensor_frame")]
    pub sensor_frame: String,

    /// Coordinate frame of lidar data
    #[serde(default = "default_laser_frame")]
    pub laser_frame: String,

    /// Coordinate frame of IMU data
    #[serde(default = "default_imu_frame")]
    pub imu_frame: String,
}

fn default_lidar_port() -> u16 {
    7502
}

fn default_imu_port() -> u16 {
    7503
}

fn default_lidar_mode() -> String {
    "512x10".to_string()
}

fn default_tcp_port() -> u16 {
    7501
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_sensor_frame() -> String {
    "laser_sensor_frame".to_string()
}

fn default_laser_frame() -> String {
    "laser_data_frame".to_string()
}

fn default_imu_frame() -> String {
    "imu_data_frame".to_string()
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            lidar_ip: None,
            computer_ip: None,
            lidar_port: default_lidar_port(),
            imu_port: default_imu_port(),
            lidar_mode: default_lidar_mode(),
            tcp_port: default_tcp_port(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            sensor_frame: default_sensor_frame(),
            laser_frame: default_laser_frame(),
            imu_frame: default_imu_frame(),
        }
    }
}

impl Parameters {
    /// Parameters with both addresses set and everything else defaulted
    pub fn with_addresses(lidar_ip: impl Into<String>, computer_ip: impl Into<String>) -> Self {
        Self {
            lidar_ip: Some(lidar_ip.into()),
            computer_ip: Some(computer_ip.into()),
            ..Default::default()
        }
    }

    /// Build the immutable sensor configuration.
    ///
    /// Required addresses are checked first so a missing address is always
    /// reported as [`ContractError::MissingParameter`].
    pub fn to_configuration(&self) -> Result<Configuration, ContractError> {
        let lidar_ip = required(&self.lidar_ip, "lidar_ip")?;
        let computer_ip = required(&self.computer_ip, "computer_ip")?;
        let lidar_mode = self.lidar_mode.parse::<LidarMode>()?;

        Ok(Configuration {
            lidar_ip,
            computer_ip,
            lidar_port: self.lidar_port,
            imu_port: self.imu_port,
            lidar_mode,
            tcp_port: self.tcp_port,
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
        })
    }

    /// Coordinate-frame names
    pub fn frames(&self) -> FrameNames {
        FrameNames {
            sensor_frame: self.sensor_frame.clone(),
            laser_frame: self.laser_frame.clone(),
            imu_frame: self.imu_frame.clone(),
        }
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String, ContractError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ContractError::missing_parameter(field)),
    }
}

/// Sensor configuration handed to the packet source.
///
/// Immutable once built; a reset builds a new one from the current parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub lidar_ip: String,
    pub computer_ip: String,
    pub lidar_port: u16,
    pub imu_port: u16,
    pub lidar_mode: LidarMode,
    pub tcp_port: u16,
    pub handshake_timeout: Duration,
}

/// Coordinate-frame identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNames {
    pub sensor_frame: String,
    pub laser_frame: String,
    pub imu_frame: String,
}

impl Default for FrameNames {
    fn default() -> Self {
        Parameters::default().frames()
    }
}

/// Horizontal resolution and rotation rate of the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LidarMode {
    #[default]
    Mode512x10,
    Mode512x20,
    Mode1024x10,
    Mode1024x20,
    Mode2048x10,
}

impl LidarMode {
    /// All supported modes
    pub const ALL: [LidarMode; 5] = [
        LidarMode::Mode512x10,
        LidarMode::Mode512x20,
        LidarMode::Mode1024x10,
        LidarMode::Mode1024x20,
        LidarMode::Mode2048x10,
    ];

    /// Columns in one revolution
    pub fn columns_per_frame(&self) -> usize {
        match self {
            LidarMode::Mode512x10 | LidarMode::Mode512x20 => 512,
            LidarMode::Mode1024x10 | LidarMode::Mode1024x20 => 1024,
            LidarMode::Mode2048x10 => 2048,
        }
    }

    /// Revolutions per second
    pub fn frequency_hz(&self) -> u32 {
        match self {
            LidarMode::Mode512x20 | LidarMode::Mode1024x20 => 20,
            _ => 10,
        }
    }

    /// Column rate (columns per second)
    pub fn column_rate_hz(&self) -> usize {
        self.columns_per_frame() * self.frequency_hz() as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LidarMode::Mode512x10 => "512x10",
            LidarMode::Mode512x20 => "512x20",
            LidarMode::Mode1024x10 => "1024x10",
            LidarMode::Mode1024x20 => "1024x20",
            LidarMode::Mode2048x10 => "2048x10",
        }
    }
}

impl fmt::Display for LidarMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LidarMode {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LidarMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| {
                ContractError::config_validation(
                    "lidar_mode",
                    format!("unsupported lidar mode '{s}', expected one of 512x10, 512x20, 1024x10, 1024x20, 2048x10"),
                )
            })
    }
}

impl TryFrom<String> for LidarMode {
    type Error = ContractError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LidarMode> for String {
    fn from(mode: LidarMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Output channel of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    RangeImage,
    IntensityImage,
    NoiseImage,
    Imu,
    Points,
}

impl Topic {
    /// All five publish channels
    pub const ALL: [Topic; 5] = [
        Topic::RangeImage,
        Topic::IntensityImage,
        Topic::NoiseImage,
        Topic::Imu,
        Topic::Points,
    ];

    /// Topic name
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::RangeImage => "range_image",
            Topic::IntensityImage => "intensity_image",
            Topic::NoiseImage => "noise_image",
            Topic::Imu => "imu",
            Topic::Points => "points",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Topics routed to this sink (empty = all)
    #[serde(default)]
    pub topics: Vec<Topic>,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

impl SinkConfig {
    /// Whether this sink subscribes to `topic`
    pub fn accepts(&self, topic: Topic) -> bool {
        self.topics.is_empty() || self.topics.contains(&topic)
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// File output
    File,
}
