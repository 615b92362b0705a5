//! Shared Drone State

use std::sync::{Arc, Mutex, PoisonError};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// The externally visible, filtered drone pose.
///
/// For now acceleration maps straight onto the position-like vector and
/// rotation rate onto the orientation-like vector; integrating them into a
/// real pose estimate is the flight controller's job, not the viewer's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DroneState {
    pub position: Vector3<f32>,
    pub orientation: Vector3<f32>,
}

impl Default for DroneState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: Vector3::zeros(),
        }
    }
}

/// Cloneable handle to the drone state shared between the telemetry path
/// (writer) and the render path (reader).
///
/// The lock is held only long enough to copy the value in or out, so a
/// reader can never observe a partially written state and neither side
/// ever waits on the other's parsing or rendering work.
#[derive(Debug, Clone, Default)]
pub struct SharedDroneState(Arc<Mutex<DroneState>>);

impl SharedDroneState {
    pub fn new(initial: DroneState) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    /// Copy out the current state.
    pub fn get(&self) -> DroneState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current state.
    pub fn set(&self, state: DroneState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}
