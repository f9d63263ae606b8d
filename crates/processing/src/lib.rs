//! # Processing
//!
//! Data processors: one converter per published product.
//!
//! Each processor is a pure function of (frame or IMU sample, metadata); they
//! share nothing but counters and may run in any order. Malformed input
//! degrades to sentinels/NaN and is counted, never raised.

mod geometry;
mod image;
mod imu;
mod metrics;
mod pointcloud;

use std::sync::Arc;

use contracts::{DriverMessage, Frame, Header, Metadata, Topic};

pub use geometry::{
    isometry_to_transform, matrix_rotation, matrix_to_isometry, static_transforms,
    to_transform_stamped, MM_TO_M,
};
pub use image::{
    build_image, IntensityImageProcessor, NoiseImageProcessor, RangeImageProcessor,
};
pub use imu::{ImuProcessor, STANDARD_GRAVITY};
pub use metrics::{ProcessorMetrics, ProcessorStats};
pub use pointcloud::{build_point_cloud, encoder_angle, lidar_point, PointCloudProcessor};

/// Converter from a completed frame to one product
pub trait FrameProcessor: Send + Sync {
    /// Topic the product is published on
    fn topic(&self) -> Topic;

    fn process(&self, frame: &Frame, metadata: &Metadata, header: &Header) -> DriverMessage;
}

/// The four frame products, in publish order
pub fn frame_processors(metrics: &Arc<ProcessorMetrics>) -> Vec<Box<dyn FrameProcessor>> {
    vec![
        Box::new(RangeImageProcessor::new(Arc::clone(metrics))),
        Box::new(IntensityImageProcessor::new(Arc::clone(metrics))),
        Box::new(NoiseImageProcessor::new(Arc::clone(metrics))),
        Box::new(PointCloudProcessor::new(Arc::clone(metrics))),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use contracts::{Frame, LidarMode, Metadata, PixelSample, RawColumn};

    pub fn metadata(beams: usize) -> Metadata {
        Metadata::synthetic("os1", LidarMode::Mode512x10, beams, 7502, 7503)
    }

    /// Frame holding the given azimuth indices, range from `range(beam, col)`
    pub fn frame_with(
        metadata: &Metadata,
        cols: impl IntoIterator<Item = usize>,
        range: impl Fn(usize, usize) -> u32,
    ) -> Frame {
        let columns = cols
            .into_iter()
            .map(|col| RawColumn {
                timestamp_ns: col as u64 * 195_312,
                measurement_id: col as u16,
                frame_id: 0,
                encoder_count: col as u32 * 176,
                pixels: (0..metadata.beams())
                    .map(|beam| PixelSample {
                        range_mm: range(beam, col),
                        reflectivity: 50,
                        signal: 100,
                        noise: 10,
                    })
                    .collect(),
            })
            .collect();
        Frame {
            id: 0,
            columns,
            expected_columns: metadata.columns_per_frame(),
        }
    }
}
