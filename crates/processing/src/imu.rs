//! IMU product
//!
//! Sensor units to SI, rotated by the IMU-to-sensor rotation (no translation).

use std::sync::Arc;

use contracts::{
    DriverMessage, Header, ImuMessage, ImuSample, Metadata, Quaternion, Timestamp, Vector3,
};
use nalgebra::Vector3 as NVector3;

use crate::geometry::matrix_rotation;
use crate::metrics::ProcessorMetrics;

/// Standard gravity (m/s^2 per g)
pub const STANDARD_GRAVITY: f64 = 9.80665;

fn to_vector(raw: [f32; 3], scale: f64) -> NVector3<f64> {
    NVector3::new(raw[0] as f64, raw[1] as f64, raw[2] as f64) * scale
}

fn finite_or_zero(v: NVector3<f64>) -> (Vector3, bool) {
    let ok = v.iter().all(|c| c.is_finite());
    let v = if ok { v } else { NVector3::zeros() };
    (Vector3 { x: v.x, y: v.y, z: v.z }, ok)
}

/// IMU converter
pub struct ImuProcessor {
    metrics: Arc<ProcessorMetrics>,
}

impl ImuProcessor {
    pub fn new(metrics: Arc<ProcessorMetrics>) -> Self {
        Self { metrics }
    }

    /// Header stamp and `seq` are filled by the caller; the stamp is replaced
    /// with the datagram's system timestamp.
    pub fn convert(&self, sample: &ImuSample, metadata: &Metadata, header: &Header) -> ImuMessage {
        let rotation = matrix_rotation(&metadata.imu_to_sensor_transform);

        let accel = rotation * to_vector(sample.accel, STANDARD_GRAVITY);
        let gyro = rotation * to_vector(sample.gyro, std::f64::consts::PI / 180.0);
        let (linear_acceleration, accel_ok) = finite_or_zero(accel);
        let (angular_velocity, gyro_ok) = finite_or_zero(gyro);
        if !(accel_ok && gyro_ok) {
            self.metrics.record_invalid_imu();
        }

        ImuMessage {
            header: Header {
                stamp: Timestamp::from_nanos(sample.sys_timestamp_ns),
                ..header.clone()
            },
            orientation: Quaternion::default(),
            angular_velocity,
            linear_acceleration,
        }
    }

    pub fn process(&self, sample: &ImuSample, metadata: &Metadata, header: &Header) -> DriverMessage {
        DriverMessage::Imu(Arc::new(self.convert(sample, metadata, header)))
    }
}
