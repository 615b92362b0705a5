//! Decoded Telemetry Sample

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One decoded telemetry packet: what the IMU on the drone reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Linear acceleration, g per axis
    pub accel: Vector3<f32>,
    /// Rotation rate, deg/s per axis
    pub rot_rate: Vector3<f32>,
}

impl TelemetrySample {
    pub fn new(accel: Vector3<f32>, rot_rate: Vector3<f32>) -> Self {
        Self { accel, rot_rate }
    }
}

impl Default for TelemetrySample {
    fn default() -> Self {
        Self {
            accel: Vector3::zeros(),
            rot_rate: Vector3::zeros(),
        }
    }
}
