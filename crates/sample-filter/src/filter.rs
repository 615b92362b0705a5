//! Moving-Average Sample Filter

use std::collections::VecDeque;

use nalgebra::Vector3;
use telemetry_protocol::TelemetrySample;

use crate::state::DroneState;

/// Default number of recent samples the filter averages over.
pub const DEFAULT_WINDOW: usize = 32;

/// Arithmetic-mean filter over a bounded history of telemetry samples.
///
/// Every ingest evicts the oldest sample once the window is full and
/// recomputes the mean over the whole window. A running sum would be
/// cheaper, but at 32 samples the full recompute is nothing and cannot
/// drift.
#[derive(Debug)]
pub struct SampleFilter {
    window: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl SampleFilter {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample and return the freshly averaged state.
    pub fn ingest(&mut self, sample: TelemetrySample) -> DroneState {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        self.average()
    }

    /// Mean of every sample currently in the window.
    ///
    /// An empty window averages to the neutral state rather than dividing
    /// by zero.
    pub fn average(&self) -> DroneState {
        if self.window.is_empty() {
            return DroneState::default();
        }
        let n = self.window.len() as f32;
        let accel = self
            .window
            .iter()
            .fold(Vector3::zeros(), |sum, s| sum + s.accel);
        let rot_rate = self
            .window
            .iter()
            .fold(Vector3::zeros(), |sum, s| sum + s.rot_rate);
        DroneState {
            position: accel / n,
            orientation: rot_rate / n,
        }
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
