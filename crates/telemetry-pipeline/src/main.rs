//! Headless Telemetry Monitor
//!
//! Stands in for the render loop: opens the serial link, then ticks at the
//! configured rate, processing telemetry and logging the filtered drone
//! state and ingest counters until Ctrl-C or the reader dies.

use std::time::Duration;

use anyhow::{bail, Context};
use telemetry_pipeline::{init_logging, Settings, TelemetryPipeline};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Drone Telemetry Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load().context("loading settings")?;
    let mut pipeline = TelemetryPipeline::new(&settings)?;

    match settings.port.as_deref() {
        Some(name) => pipeline.open(name).await?,
        None => {
            if !pipeline.auto_open().await? {
                let ports = pipeline.available_ports();
                bail!(
                    "auto-open needs exactly one candidate port, found {}: {:?}; \
                     set `port` in telemetry.toml",
                    ports.len(),
                    ports
                );
            }
        }
    }
    info!(
        "connected to {}",
        pipeline.port_name().unwrap_or("<unknown>")
    );

    pipeline.configure()?;
    pipeline.start_reading().await?;

    let mut ticker = tokio::time::interval(Duration::from_micros(
        1_000_000 / u64::from(settings.tick_hz.max(1)),
    ));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            _ = ticker.tick() => {
                let report = pipeline.process_telemetry();
                if report.samples > 0 {
                    let state = pipeline.drone_state();
                    let stats = pipeline.stats();
                    info!(
                        "pos ({:+.3} {:+.3} {:+.3})  rot ({:+.3} {:+.3} {:+.3})  \
                         dropped {} discarded {}",
                        state.position.x,
                        state.position.y,
                        state.position.z,
                        state.orientation.x,
                        state.orientation.y,
                        state.orientation.z,
                        stats.dropped_bytes,
                        stats.discarded_packets,
                    );
                }
                if !pipeline.is_reading() {
                    warn!("serial reader stopped; reopen the port to resume");
                    break;
                }
            }
        }
    }

    pipeline.stop_reading().await?;
    Ok(())
}
