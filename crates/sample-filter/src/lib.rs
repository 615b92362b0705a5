//! Sample Filtering and Shared Drone State
//!
//! Smooths the decoded telemetry stream with a moving average over a
//! bounded window of recent samples and publishes the result as the drone
//! state the render path reads once per frame.

mod filter;
mod state;

pub use filter::{SampleFilter, DEFAULT_WINDOW};
pub use state::{DroneState, SharedDroneState};
