//! Organized point cloud
//!
//! Height = beams, width = columns per frame. Samples without a return and
//! pixels of missing columns become NaN points with range 0, so the cloud is
//! never dense when anything is missing.

use std::f64::consts::TAU;
use std::sync::Arc;

use contracts::{DriverMessage, Frame, Header, Metadata, Point, PointCloud, Topic};
use nalgebra::{Isometry3, Point3};
use tracing::debug;

use crate::geometry::{matrix_to_isometry, MM_TO_M};
use crate::image::column_fits;
use crate::metrics::ProcessorMetrics;
use crate::FrameProcessor;

/// Per-beam trigonometry derived from the beam intrinsics
struct BeamTable {
    /// Azimuth offset (rad), already negated
    azimuth: Vec<f64>,
    cos_altitude: Vec<f64>,
    sin_altitude: Vec<f64>,
}

impl BeamTable {
    fn new(metadata: &Metadata) -> Self {
        let beams = &metadata.beam_intrinsics;
        let altitude = beams
            .beam_altitude_angles
            .iter()
            .map(|deg| TAU * deg / 360.0);
        Self {
            azimuth: beams
                .beam_azimuth_angles
                .iter()
                .map(|deg| -TAU * deg / 360.0)
                .collect(),
            cos_altitude: altitude.clone().map(f64::cos).collect(),
            sin_altitude: altitude.map(f64::sin).collect(),
        }
    }
}

/// Encoder angle of azimuth index `m` out of `width`
pub fn encoder_angle(m: usize, width: usize) -> f64 {
    TAU * (1.0 - m as f64 / width as f64)
}

/// Lidar-frame point of one return
pub fn lidar_point(range_m: f64, theta: f64, azimuth: f64, cos_phi: f64, sin_phi: f64) -> Point3<f64> {
    let angle = theta + azimuth;
    Point3::new(
        range_m * angle.cos() * cos_phi,
        range_m * angle.sin() * cos_phi,
        range_m * sin_phi,
    )
}

/// Convert a frame into an organized cloud in the sensor frame
pub fn build_point_cloud(
    frame: &Frame,
    metadata: &Metadata,
    header: &Header,
    metrics: &ProcessorMetrics,
) -> PointCloud {
    let beams = metadata.beams();
    let width = metadata.columns_per_frame();
    let table = BeamTable::new(metadata);
    let lidar_to_sensor: Isometry3<f64> = matrix_to_isometry(&metadata.lidar_to_sensor_transform);

    let mut points: Vec<Point> = (0..beams * width)
        .map(|i| Point::invalid((i / width) as u16))
        .collect();

    let mut placed = vec![false; width];
    let mut skipped = 0u64;
    for column in &frame.columns {
        if !column_fits(column, beams, width) || placed[column.measurement_id as usize] {
            skipped += 1;
            continue;
        }
        let col = column.measurement_id as usize;
        placed[col] = true;
        let theta = encoder_angle(col, width);

        for (beam, px) in column.pixels.iter().enumerate() {
            if px.range_mm == 0 {
                continue;
            }
            let p = lidar_to_sensor
                * lidar_point(
                    px.range_mm as f64 * MM_TO_M,
                    theta,
                    table.azimuth[beam],
                    table.cos_altitude[beam],
                    table.sin_altitude[beam],
                );
            points[beam * width + col] = Point {
                x: p.x as f32,
                y: p.y as f32,
                z: p.z as f32,
                intensity: px.signal as f32,
                range: px.range_mm,
                ring: beam as u16,
            };
        }
    }

    let invalid = points.iter().filter(|p| !p.is_valid()).count() as u64;
    if skipped > 0 {
        debug!(frame_id = frame.id, skipped, "columns left out of point cloud");
    }
    metrics.add_skipped_columns(skipped);
    metrics.add_invalid_points(invalid);

    PointCloud {
        header: header.clone(),
        height: beams,
        width,
        points,
        is_dense: invalid == 0,
    }
}

/// Point cloud product
pub struct PointCloudProcessor {
    metrics: Arc<ProcessorMetrics>,
}

impl PointCloudProcessor {
    pub fn new(metrics: Arc<ProcessorMetrics>) -> Self {
        Self { metrics }
    }
}

impl FrameProcessor for PointCloudProcessor {
    fn topic(&self) -> Topic {
        Topic::Points
    }

    fn process(&self, frame: &Frame, metadata: &Metadata, header: &Header) -> DriverMessage {
        DriverMessage::Points(Arc::new(build_point_cloud(
            frame,
            metadata,
            header,
            &self.metrics,
        )))
    }
}
