//! Sensor data model - from raw columns to published products

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Topic;

/// Nanoseconds per second
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Message timestamp split into seconds and nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub sec: u64,
    pub nanosec: u32,
}

impl Timestamp {
    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            sec: nanos / NANOS_PER_SEC,
            nanosec: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    pub fn as_nanos(&self) -> u64 {
        self.sec * NANOS_PER_SEC + self.nanosec as u64
    }
}

/// Header shared by every published product
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Sensor time of the first sample
    pub stamp: Timestamp,
    /// Coordinate frame the data is expressed in
    pub frame_id: String,
    /// Frame id (lidar products) or IMU sequence number
    pub seq: u64,
}

/// One beam measurement of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelSample {
    /// Range in millimetres, 0 = no return
    pub range_mm: u32,
    pub reflectivity: u16,
    /// Signal photons, published as intensity
    pub signal: u16,
    /// Ambient noise photons
    pub noise: u16,
}

/// One decoded column block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawColumn {
    /// Sensor timestamp (ns)
    pub timestamp_ns: u64,
    /// Azimuth index within the revolution
    pub measurement_id: u16,
    /// Frame counter reported by the sensor
    pub frame_id: u16,
    pub encoder_count: u32,
    /// One sample per beam, index = beam
    pub pixels: Vec<PixelSample>,
}

/// One revolution worth of columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Assembler-assigned id, strictly increasing
    pub id: u64,
    /// Columns in arrival order
    pub columns: Vec<RawColumn>,
    /// Horizontal resolution of the configured mode
    pub expected_columns: usize,
}

impl Frame {
    /// A frame is complete when it holds exactly one column per azimuth step,
    /// i.e. column `i` carries measurement index `i` for every `i < expected_columns`.
    pub fn is_complete(&self) -> bool {
        self.columns.len() == self.expected_columns
            && self
                .columns
                .iter()
                .enumerate()
                .all(|(i, c)| c.measurement_id as usize == i)
    }

    /// Timestamp of the first column (ns)
    pub fn timestamp_ns(&self) -> u64 {
        self.columns.first().map(|c| c.timestamp_ns).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One decoded IMU datagram, sensor units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuSample {
    /// System timestamp (ns)
    pub sys_timestamp_ns: u64,
    pub accel_timestamp_ns: u64,
    pub gyro_timestamp_ns: u64,
    /// Linear acceleration (g)
    pub accel: [f32; 3],
    /// Angular velocity (deg/s)
    pub gyro: [f32; 3],
}

/// Row-major 2D image, rows = beams, columns = azimuth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image<T> {
    pub header: Header,
    pub height: usize,
    pub width: usize,
    pub data: Vec<T>,
}

impl<T: Copy + Default> Image<T> {
    /// Image filled with the sentinel value
    pub fn new(header: Header, height: usize, width: usize) -> Self {
        Self {
            header,
            height,
            width,
            data: vec![T::default(); height * width],
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row < self.height && col < self.width {
            self.data.get(row * self.width + col).copied()
        } else {
            None
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        if row < self.height && col < self.width {
            self.data[row * self.width + col] = value;
        }
    }
}

/// Range in millimetres per pixel
pub type RangeImage = Image<u32>;
/// Signal photons per pixel
pub type IntensityImage = Image<u16>;
/// Ambient noise photons per pixel
pub type NoiseImage = Image<u16>;

/// One point of an organized cloud
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: f32,
    /// Range in millimetres, 0 = no return
    pub range: u32,
    /// Beam index
    pub ring: u16,
}

impl Point {
    /// Placeholder for a missing or invalid sample
    pub fn invalid(ring: u16) -> Self {
        Self {
            x: f32::NAN,
            y: f32::NAN,
            z: f32::NAN,
            intensity: 0.0,
            range: 0,
            ring,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Organized point cloud, `points[row * width + col]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub header: Header,
    pub height: usize,
    pub width: usize,
    pub points: Vec<Point>,
    /// False when any point is invalid
    pub is_dense: bool,
}

impl PointCloud {
    pub fn get(&self, row: usize, col: usize) -> Option<&Point> {
        if row < self.height && col < self.width {
            self.points.get(row * self.width + col)
        } else {
            None
        }
    }

    pub fn valid_points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(|p| p.is_valid())
    }
}

/// 3-vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Unit quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// IMU output, SI units in the IMU data frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuMessage {
    pub header: Header,
    /// Not measured by the sensor, always identity
    pub orientation: Quaternion,
    /// rad/s
    pub angular_velocity: Vector3,
    /// m/s^2
    pub linear_acceleration: Vector3,
}

/// Rigid transform, translation in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vector3,
    pub rotation: Quaternion,
}

/// Transform from `header.frame_id` (parent) to `child_frame_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

/// Product handed to the publish collaborators
#[derive(Debug, Clone)]
pub enum DriverMessage {
    RangeImage(Arc<RangeImage>),
    IntensityImage(Arc<IntensityImage>),
    NoiseImage(Arc<NoiseImage>),
    Imu(Arc<ImuMessage>),
    Points(Arc<PointCloud>),
}

impl DriverMessage {
    pub fn topic(&self) -> Topic {
        match self {
            DriverMessage::RangeImage(_) => Topic::RangeImage,
            DriverMessage::IntensityImage(_) => Topic::IntensityImage,
            DriverMessage::NoiseImage(_) => Topic::NoiseImage,
            DriverMessage::Imu(_) => Topic::Imu,
            DriverMessage::Points(_) => Topic::Points,
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            DriverMessage::RangeImage(m) => &m.header,
            DriverMessage::IntensityImage(m) => &m.header,
            DriverMessage::NoiseImage(m) => &m.header,
            DriverMessage::Imu(m) => &m.header,
            DriverMessage::Points(m) => &m.header,
        }
    }
}
