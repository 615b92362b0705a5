//! Drone Telemetry Wire Protocol
//!
//! This crate understands the byte stream produced by the telemetry board:
//! fixed-length ASCII packets delimited by start/stop symbols, carrying six
//! fixed-point numeric fields (three acceleration axes, three rotation-rate
//! axes). It provides the layout descriptor, the streaming packet assembler
//! that resynchronizes after corruption, and the field codec.

mod assembler;
mod decoder;
mod error;
mod format;
mod sample;

pub use assembler::{PacketAssembler, RawPacket};
pub use decoder::TelemetryDecoder;
pub use error::ProtocolError;
pub use format::TelemetryFormat;
pub use sample::TelemetrySample;
