//! LogSink - logs message summaries via tracing

use contracts::{ContractError, DataSink, DriverMessage};
use tracing::{info, instrument};

/// Sink that logs message summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_summary(&self, message: &DriverMessage) {
        let header = message.header();
        match message {
            DriverMessage::RangeImage(img) => {
                let valid = img.data.iter().filter(|&&v| v != 0).count();
                info!(
                    sink = %self.name,
                    topic = %message.topic(),
                    seq = header.seq,
                    stamp_sec = header.stamp.sec,
                    width = img.width,
                    height = img.height,
                    valid,
                    "image"
                );
            }
            DriverMessage::IntensityImage(img) | DriverMessage::NoiseImage(img) => {
                info!(
                    sink = %self.name,
                    topic = %message.topic(),
                    seq = header.seq,
                    stamp_sec = header.stamp.sec,
                    width = img.width,
                    height = img.height,
                    "image"
                );
            }
            DriverMessage::Points(cloud) => {
                info!(
                    sink = %self.name,
                    seq = header.seq,
                    stamp_sec = header.stamp.sec,
                    frame_id = %header.frame_id,
                    points = cloud.points.len(),
                    valid = cloud.valid_points().count(),
                    dense = cloud.is_dense,
                    "point cloud"
                );
            }
            DriverMessage::Imu(imu) => {
                info!(
                    sink = %self.name,
                    seq = header.seq,
                    stamp_sec = header.stamp.sec,
                    stamp_nanosec = header.stamp.nanosec,
                    accel_z = imu.linear_acceleration.z,
                    gyro_z = imu.angular_velocity.z,
                    "imu"
                );
            }
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, message),
        fields(sink = %self.name, topic = %message.topic())
    )]
    async fn write(&mut self, message: &DriverMessage) -> Result<(), ContractError> {
        self.log_summary(message);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
