//! Telemetry Packet Layout

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Immutable layout descriptor for the telemetry wire format.
///
/// A packet is `packet_len` bytes, begins with `start_symbol`, and is
/// terminated on the wire by `stop_symbol` (the stop byte is not part of
/// the counted length). Six ASCII integer fields of `field_width` bytes
/// sit at fixed offsets; each decodes to `integer / conversion_factor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFormat {
    /// Packet length in bytes, start symbol included
    pub packet_len: usize,
    /// First byte of every packet
    pub start_symbol: u8,
    /// Byte terminating a packet on the wire
    pub stop_symbol: u8,
    /// Fixed-point scale divisor applied to every field
    pub conversion_factor: u32,
    /// Width of one ASCII field in bytes
    pub field_width: usize,
    /// Byte offsets of the x/y/z acceleration fields
    pub accel_offsets: [usize; 3],
    /// Byte offsets of the x/y/z rotation-rate fields
    pub rot_rate_offsets: [usize; 3],
}

impl Default for TelemetryFormat {
    /// The telemetry board's reference configuration.
    fn default() -> Self {
        Self {
            packet_len: 37,
            start_symbol: b'|',
            stop_symbol: b'\n',
            conversion_factor: 1000,
            field_width: 5,
            accel_offsets: [1, 7, 13],
            rot_rate_offsets: [19, 25, 31],
        }
    }
}

impl TelemetryFormat {
    /// Byte capacity the raw ingest buffer must have for this format.
    ///
    /// Two full packets minus one byte is the smallest buffer that still
    /// guarantees a complete packet with a discoverable start symbol is
    /// present whatever the phase between producer and consumer: with
    /// start `A`, stop `C`, and length 3, a full buffer can only hold the
    /// rotations `BAC|BA`, `CBA|CB`, `ACB|AC`, and each contains one full
    /// frame. Shrinking the buffer breaks that guarantee; growing it only
    /// adds memory and latency.
    pub fn buffer_capacity(&self) -> usize {
        2 * self.packet_len - 1
    }

    /// Check the descriptor for internal consistency.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.packet_len == 0 {
            return Err(ProtocolError::InvalidFormat(
                "packet length must be nonzero".into(),
            ));
        }
        if self.start_symbol == self.stop_symbol {
            return Err(ProtocolError::InvalidFormat(
                "start and stop symbols must differ".into(),
            ));
        }
        if self.conversion_factor == 0 {
            return Err(ProtocolError::InvalidFormat(
                "conversion factor must be nonzero".into(),
            ));
        }
        if self.field_width == 0 {
            return Err(ProtocolError::InvalidFormat(
                "field width must be nonzero".into(),
            ));
        }
        for &offset in self.accel_offsets.iter().chain(&self.rot_rate_offsets) {
            if offset == 0 {
                return Err(ProtocolError::InvalidFormat(
                    "field offset 0 collides with the start symbol".into(),
                ));
            }
            if offset + self.field_width > self.packet_len {
                return Err(ProtocolError::InvalidFormat(format!(
                    "field at offset {} overruns the {}-byte packet",
                    offset, self.packet_len
                )));
            }
        }
        Ok(())
    }
}
