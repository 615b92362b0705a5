//! Drone Telemetry Pipeline
//!
//! The orchestration layer the rest of the application talks to. It wires
//! the serial device, the shared ingest buffer, the packet assembler, the
//! decoder, and the sample filter together, and exposes one synchronous
//! `process_telemetry()` entry point the render loop calls once per frame.

mod pipeline;
mod settings;

pub use pipeline::{IngestStats, PipelineError, TelemetryPipeline, TelemetryReport};
pub use settings::Settings;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging for the process.
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set tracing subscriber");
}
