//! Protocol Error Types

use thiserror::Error;

/// Errors raised while validating, decoding, or encoding telemetry packets
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Packet does not match the configured length
    #[error("packet length mismatch: expected {expected} bytes, got {actual}")]
    PacketLength { expected: usize, actual: usize },

    /// A field slice is not parseable fixed-point ASCII
    #[error("field at offset {offset} is not fixed-point ASCII: {text:?}")]
    FieldParse { offset: usize, text: String },

    /// A value cannot be represented in the configured field width
    #[error("value {value} does not fit a {width}-byte field")]
    FieldRange { value: f32, width: usize },

    /// The layout descriptor is internally inconsistent
    #[error("invalid telemetry format: {0}")]
    InvalidFormat(String),
}
