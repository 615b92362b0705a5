//! Fixed-Point Field Codec
//!
//! Extracts the six fixed-width ASCII numeric fields of a framed packet
//! and converts them to engineering units via the format's fixed-point
//! scale divisor. The inverse direction exists for loopback feeds and
//! round-trip tests; the viewer itself never transmits.

use nalgebra::Vector3;

use crate::error::ProtocolError;
use crate::format::TelemetryFormat;
use crate::sample::TelemetrySample;

/// Decodes framed packets into [`TelemetrySample`]s.
pub struct TelemetryDecoder {
    format: TelemetryFormat,
}

impl TelemetryDecoder {
    pub fn new(format: TelemetryFormat) -> Self {
        Self { format }
    }

    /// Decode one framed packet.
    ///
    /// The packet must be exactly `packet_len` bytes. A malformed field
    /// aborts this sample only: the packet already passed framing, so the
    /// assembler's state is sound and the caller simply skips the sample.
    pub fn decode(&self, packet: &[u8]) -> Result<TelemetrySample, ProtocolError> {
        if packet.len() != self.format.packet_len {
            return Err(ProtocolError::PacketLength {
                expected: self.format.packet_len,
                actual: packet.len(),
            });
        }

        let [ax, ay, az] = self.format.accel_offsets;
        let [rx, ry, rz] = self.format.rot_rate_offsets;
        Ok(TelemetrySample {
            accel: Vector3::new(
                self.parse_field(packet, ax)?,
                self.parse_field(packet, ay)?,
                self.parse_field(packet, az)?,
            ),
            rot_rate: Vector3::new(
                self.parse_field(packet, rx)?,
                self.parse_field(packet, ry)?,
                self.parse_field(packet, rz)?,
            ),
        })
    }

    /// Encode a sample into a framed packet (stop symbol not included).
    ///
    /// Fields are right-aligned ASCII integers, space padding elsewhere.
    /// Values whose scaled integer does not fit the field width are
    /// rejected rather than truncated.
    pub fn encode(&self, sample: &TelemetrySample) -> Result<Vec<u8>, ProtocolError> {
        let mut packet = vec![b' '; self.format.packet_len];
        packet[0] = self.format.start_symbol;

        let [ax, ay, az] = self.format.accel_offsets;
        let [rx, ry, rz] = self.format.rot_rate_offsets;
        let fields = [
            (ax, sample.accel.x),
            (ay, sample.accel.y),
            (az, sample.accel.z),
            (rx, sample.rot_rate.x),
            (ry, sample.rot_rate.y),
            (rz, sample.rot_rate.z),
        ];
        for (offset, value) in fields {
            self.write_field(&mut packet, offset, value)?;
        }
        Ok(packet)
    }

    fn parse_field(&self, packet: &[u8], offset: usize) -> Result<f32, ProtocolError> {
        let width = self.format.field_width;
        let raw = packet
            .get(offset..offset + width)
            .ok_or_else(|| ProtocolError::InvalidFormat(format!(
                "field at offset {offset} overruns the packet"
            )))?;
        let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::FieldParse {
            offset,
            text: String::from_utf8_lossy(raw).into_owned(),
        })?;
        let scaled: i32 = text.trim().parse().map_err(|_| ProtocolError::FieldParse {
            offset,
            text: text.to_owned(),
        })?;
        Ok(scaled as f32 / self.format.conversion_factor as f32)
    }

    fn write_field(
        &self,
        packet: &mut [u8],
        offset: usize,
        value: f32,
    ) -> Result<(), ProtocolError> {
        let width = self.format.field_width;
        let scaled = (value * self.format.conversion_factor as f32).round() as i64;
        let text = format!("{scaled:>width$}");
        if text.len() != width {
            return Err(ProtocolError::FieldRange { value, width });
        }
        let slot = packet.get_mut(offset..offset + width).ok_or_else(|| {
            ProtocolError::InvalidFormat(format!("field at offset {offset} overruns the packet"))
        })?;
        slot.copy_from_slice(text.as_bytes());
        Ok(())
    }
}
