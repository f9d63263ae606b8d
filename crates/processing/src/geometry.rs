//! Geometry helpers
//!
//! Sensor transforms arrive as 4x4 row-major homogeneous matrices with the
//! translation in millimetres; everything published is in metres.

use contracts::{
    FrameNames, Header, Metadata, Quaternion, Timestamp, Transform, TransformMatrix,
    TransformStamped, Vector3,
};
use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion};

/// Millimetres to metres
pub const MM_TO_M: f64 = 0.001;

/// Rotation part of a row-major homogeneous matrix.
///
/// Calibration matrices are rotations up to rounding; the quaternion is
/// renormalized.
pub fn matrix_rotation(matrix: &TransformMatrix) -> UnitQuaternion<f64> {
    let m = Matrix3::new(
        matrix[0], matrix[1], matrix[2], //
        matrix[4], matrix[5], matrix[6], //
        matrix[8], matrix[9], matrix[10],
    );
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m));
    UnitQuaternion::new_normalize(q.into_inner())
}

/// Rigid transform of a row-major homogeneous matrix, translation converted to metres
pub fn matrix_to_isometry(matrix: &TransformMatrix) -> Isometry3<f64> {
    let translation = Translation3::new(
        matrix[3] * MM_TO_M,
        matrix[7] * MM_TO_M,
        matrix[11] * MM_TO_M,
    );
    Isometry3::from_parts(translation, matrix_rotation(matrix))
}

pub fn isometry_to_transform(iso: &Isometry3<f64>) -> Transform {
    let t = iso.translation.vector;
    let q = iso.rotation.quaternion();
    Transform {
        translation: Vector3 {
            x: t.x,
            y: t.y,
            z: t.z,
        },
        rotation: Quaternion {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        },
    }
}

/// Stamped transform from `parent` to `child`
pub fn to_transform_stamped(
    matrix: &TransformMatrix,
    parent: &str,
    child: &str,
    stamp: Timestamp,
) -> TransformStamped {
    TransformStamped {
        header: Header {
            stamp,
            frame_id: parent.to_string(),
            seq: 0,
        },
        child_frame_id: child.to_string(),
        transform: isometry_to_transform(&matrix_to_isometry(matrix)),
    }
}

/// The two static transforms announced at configure: sensor to IMU, sensor to lidar
pub fn static_transforms(
    metadata: &Metadata,
    frames: &FrameNames,
    stamp: Timestamp,
) -> [TransformStamped; 2] {
    [
        to_transform_stamped(
            &metadata.imu_to_sensor_transform,
            &frames.sensor_frame,
            &frames.imu_frame,
            stamp,
        ),
        to_transform_stamped(
            &metadata.lidar_to_sensor_transform,
            &frames.sensor_frame,
            &frames.laser_frame,
            stamp,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LidarMode, IDENTITY_MATRIX};
    use nalgebra::Point3;

    #[test]
    fn test_identity() {
        let iso = matrix_to_isometry(&IDENTITY_MATRIX);
        let p = iso * Point3::new(1.0, 2.0, 3.0);
        assert!((p - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_translation_in_metres() {
        let meta = Metadata::synthetic("os1", LidarMode::Mode512x10, 4, 7502, 7503);
        let iso = matrix_to_isometry(&meta.lidar_to_sensor_transform);
        assert!((iso.translation.vector.z - 0.03618).abs() < 1e-12);

        // 180 degree yaw: x flips
        let p = iso * Point3::new(1.0, 0.0, 0.0);
        assert!((p.x + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_static_transforms() {
        let meta = Metadata::synthetic("os1", LidarMode::Mode512x10, 4, 7502, 7503);
        let frames = FrameNames::default();
        let [imu, lidar] = static_transforms(&meta, &frames, Timestamp::from_nanos(5));

        assert_eq!(imu.header.frame_id, "laser_sensor_frame");
        assert_eq!(imu.child_frame_id, "imu_data_frame");
        assert!((imu.transform.translation.x - 0.006253).abs() < 1e-12);
        assert!((imu.transform.rotation.w - 1.0).abs() < 1e-12);

        assert_eq!(lidar.child_frame_id, "laser_data_frame");
        // Rotation of pi about z
        assert!(lidar.transform.rotation.z.abs() > 0.999);
    }
}
