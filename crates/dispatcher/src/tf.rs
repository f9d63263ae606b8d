//! Static transform broadcasters

use std::sync::Mutex;

use contracts::{ContractError, TransformBroadcaster, TransformStamped};
use tracing::info;

/// Announces static transforms through the log
#[derive(Debug, Default)]
pub struct LogTransformBroadcaster;

impl TransformBroadcaster for LogTransformBroadcaster {
    fn send_static_transforms(&self, transforms: &[TransformStamped]) -> Result<(), ContractError> {
        for tf in transforms {
            let t = &tf.transform.translation;
            let q = &tf.transform.rotation;
            info!(
                parent = %tf.header.frame_id,
                child = %tf.child_frame_id,
                x = t.x,
                y = t.y,
                z = t.z,
                qx = q.x,
                qy = q.y,
                qz = q.z,
                qw = q.w,
                "static transform"
            );
        }
        Ok(())
    }
}

/// Keeps the latest set of static transforms, replacing on every announcement
#[derive(Debug, Default)]
pub struct RecordingTransformBroadcaster {
    latest: Mutex<Vec<TransformStamped>>,
    announcements: Mutex<u64>,
}

impl RecordingTransformBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transforms(&self) -> Vec<TransformStamped> {
        self.latest.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// How many times transforms were announced
    pub fn announcements(&self) -> u64 {
        self.announcements.lock().map(|n| *n).unwrap_or_default()
    }
}

impl TransformBroadcaster for RecordingTransformBroadcaster {
    fn send_static_transforms(&self, transforms: &[TransformStamped]) -> Result<(), ContractError> {
        *self
            .latest
            .lock()
            .map_err(|_| ContractError::Other("transform store poisoned".into()))? =
            transforms.to_vec();
        *self
            .announcements
            .lock()
            .map_err(|_| ContractError::Other("transform store poisoned".into()))? += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Header, Transform};

    fn stamped(child: &str) -> TransformStamped {
        TransformStamped {
            header: Header {
                frame_id: "laser_sensor_frame".into(),
                ..Default::default()
            },
            child_frame_id: child.into(),
            transform: Transform::default(),
        }
    }

    #[test]
    fn test_recording_replaces_previous_set() {
        let tf = RecordingTransformBroadcaster::new();
        tf.send_static_transforms(&[stamped("imu_data_frame"), stamped("laser_data_frame")])
            .unwrap();
        tf.send_static_transforms(&[stamped("imu_data_frame")]).unwrap();

        assert_eq!(tf.announcements(), 2);
        let latest = tf.transforms();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].child_frame_id, "imu_data_frame");
    }

    #[test]
    fn test_log_broadcaster_accepts_all() {
        assert!(LogTransformBroadcaster
            .send_static_transforms(&[stamped("laser_data_frame")])
            .is_ok());
    }
}
