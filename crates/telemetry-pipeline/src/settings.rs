//! Pipeline Settings
//!
//! Layered configuration: defaults matching the telemetry board's
//! reference setup, overridden by an optional `telemetry.toml` next to the
//! binary, overridden in turn by `TELEMETRY__`-prefixed environment
//! variables (e.g. `TELEMETRY__SERIAL__BAUD_RATE=115200`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serial_link::SerialConfig;
use telemetry_protocol::TelemetryFormat;

/// Everything the pipeline and the monitor binary need to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Port to open; `None` means auto-discover (exactly one candidate).
    pub port: Option<String>,
    /// UART parameters applied on `configure`.
    pub serial: SerialConfig,
    /// Wire-format geometry. Symbols are raw byte values.
    pub format: TelemetryFormat,
    /// Moving-average window in samples.
    pub filter_window: usize,
    /// Monitor tick rate in Hz; the render loop's stand-in.
    pub tick_hz: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            serial: SerialConfig::default(),
            format: TelemetryFormat::default(),
            filter_window: sample_filter::DEFAULT_WINDOW,
            tick_hz: 60,
        }
    }
}

impl Settings {
    /// Load settings from file and environment over the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("telemetry").required(false))
            .add_source(
                Environment::with_prefix("TELEMETRY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
