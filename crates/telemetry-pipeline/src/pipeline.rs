//! Pipeline Orchestration
//!
//! Data flow: serial reader task → `BoundedBuffer<u8>` → `PacketAssembler`
//! → `TelemetryDecoder` → `SampleFilter` → `SharedDroneState`, with the
//! render loop as the read-only consumer at the end. The consumer side is
//! entirely non-blocking; all waiting happens in the reader task.

use std::sync::Arc;

use bounded_buffer::BoundedBuffer;
use sample_filter::{DroneState, SampleFilter, SharedDroneState};
use serial_link::{LinkError, SerialConfig, SerialDevice};
use telemetry_protocol::{PacketAssembler, ProtocolError, TelemetryDecoder};
use thiserror::Error;
use tracing::debug;

use crate::settings::Settings;

/// Errors surfaced by the pipeline facade
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Serial link failure
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Wire format or codec failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Settings could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// What one `process_telemetry` call accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryReport {
    /// Complete packets pulled out of the byte stream
    pub packets: usize,
    /// Samples decoded and folded into the filter
    pub samples: usize,
    /// Packets that framed correctly but failed field decoding
    pub rejected: usize,
}

/// Ingest-side counters for the status display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Bytes currently waiting in the ingest buffer
    pub buffered_bytes: usize,
    /// Bytes refused because the buffer was full (lifetime total)
    pub dropped_bytes: u64,
    /// Packet candidates discarded by the assembler (lifetime total)
    pub discarded_packets: u64,
}

/// The telemetry subsystem as one object.
pub struct TelemetryPipeline {
    serial_config: SerialConfig,
    buffer: Arc<BoundedBuffer<u8>>,
    device: SerialDevice,
    assembler: PacketAssembler,
    decoder: TelemetryDecoder,
    filter: SampleFilter,
    state: SharedDroneState,
}

impl TelemetryPipeline {
    /// Build the pipeline from settings.
    ///
    /// Validates the wire format and sizes the ingest buffer at the
    /// format's two-packets-minus-one-byte minimum.
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        let format = settings.format.clone();
        format.validate()?;

        let buffer = Arc::new(BoundedBuffer::new(format.buffer_capacity()));
        let device = SerialDevice::new(Arc::clone(&buffer));
        let assembler = PacketAssembler::new(format.clone(), Arc::clone(&buffer));
        let decoder = TelemetryDecoder::new(format);

        Ok(Self {
            serial_config: settings.serial,
            buffer,
            device,
            assembler,
            decoder,
            filter: SampleFilter::new(settings.filter_window),
            state: SharedDroneState::default(),
        })
    }

    /// Enumerate serial ports without opening anything.
    pub fn find_ports(&mut self) -> Result<Vec<String>, PipelineError> {
        Ok(self.device.find_ports()?)
    }

    /// Open the named serial port.
    pub async fn open(&mut self, name: &str) -> Result<(), PipelineError> {
        Ok(self.device.open(name).await?)
    }

    /// Open an in-memory loopback link instead of hardware; returns the
    /// write half to feed.
    pub fn open_loopback(&mut self) -> Result<tokio::io::DuplexStream, PipelineError> {
        Ok(self.device.open_loopback()?)
    }

    /// Open automatically if discovery finds exactly one port.
    pub async fn auto_open(&mut self) -> Result<bool, PipelineError> {
        Ok(self.device.auto_open().await?)
    }

    /// Apply the configured UART parameters to the open port.
    pub fn configure(&mut self) -> Result<(), PipelineError> {
        let config = self.serial_config;
        Ok(self.device.configure(&config)?)
    }

    /// Start pulling bytes off the link in the background.
    pub async fn start_reading(&mut self) -> Result<(), PipelineError> {
        Ok(self.device.start_reading().await?)
    }

    /// Stop the background reader and wait for it to exit.
    pub async fn stop_reading(&mut self) -> Result<(), PipelineError> {
        Ok(self.device.stop_reading().await?)
    }

    /// Close the link entirely.
    pub async fn close(&mut self) -> Result<(), PipelineError> {
        Ok(self.device.close().await?)
    }

    pub fn is_open(&self) -> bool {
        self.device.is_open()
    }

    /// False once the reader has died, whether stopped or failed.
    pub fn is_reading(&self) -> bool {
        self.device.is_reading()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.device.port_name()
    }

    pub fn available_ports(&self) -> &[String] {
        self.device.available_ports()
    }

    /// The per-frame telemetry step. Call exactly once per render tick.
    ///
    /// Drains every packet that is currently complete, decodes each,
    /// folds the good samples into the moving average, and publishes the
    /// result under the shared lock. Never blocks: when no data has
    /// arrived this returns immediately with an empty report, and the
    /// frame rate is unaffected.
    pub fn process_telemetry(&mut self) -> TelemetryReport {
        let mut report = TelemetryReport::default();

        while let Some(packet) = self.assembler.poll() {
            report.packets += 1;
            match self.decoder.decode(&packet) {
                Ok(sample) => {
                    let filtered = self.filter.ingest(sample);
                    self.state.set(filtered);
                    report.samples += 1;
                }
                Err(e) => {
                    report.rejected += 1;
                    debug!("rejecting undecodable packet: {}", e);
                }
            }
        }

        report
    }

    /// Copy of the current filtered drone state.
    pub fn drone_state(&self) -> DroneState {
        self.state.get()
    }

    /// Cloneable handle for a consumer on another thread.
    pub fn shared_state(&self) -> SharedDroneState {
        self.state.clone()
    }

    /// Ingest counters for the status display.
    pub fn stats(&self) -> IngestStats {
        IngestStats {
            buffered_bytes: self.buffer.len(),
            dropped_bytes: self.buffer.dropped_elements(),
            discarded_packets: self.assembler.discarded_packets(),
        }
    }
}

impl std::fmt::Debug for TelemetryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPipeline")
            .field("port_name", &self.port_name())
            .field("reading", &self.is_reading())
            .field("stats", &self.stats())
            .finish()
    }
}
