//! Streaming Packet Assembler
//!
//! Turns the raw byte queue filled by the serial reader into complete,
//! framed packets, resynchronizing automatically after dropped bytes,
//! phase misalignment, or corruption.

use std::sync::Arc;

use bounded_buffer::BoundedBuffer;
use tracing::debug;

use crate::format::TelemetryFormat;

/// A complete framed packet: exactly `packet_len` bytes, first byte equal
/// to the start symbol. Consumed immediately by the decoder, never retained.
pub type RawPacket = Vec<u8>;

/// Pulls bytes off the shared ingest buffer and emits framed packets.
///
/// The telemetry stream is processed in a streaming fashion: only the most
/// recent data matters, and the ingest buffer is deliberately kept at the
/// minimum of two packets minus one byte (see
/// [`TelemetryFormat::buffer_capacity`]). The assembler scans for a start
/// symbol, accumulates until a stop symbol or the buffer runs dry, and
/// emits the candidate only if it has exactly the configured length and a
/// valid leading byte. Anything else is discarded and the scan restarts,
/// so at most one packet length of garbage is ever consumed before
/// realignment.
pub struct PacketAssembler {
    format: TelemetryFormat,
    buffer: Arc<BoundedBuffer<u8>>,
    /// Whether a candidate packet is currently being accumulated. When
    /// false the assembler is scanning for a start symbol.
    building: bool,
    partial: Vec<u8>,
    discarded: u64,
}

impl PacketAssembler {
    pub fn new(format: TelemetryFormat, buffer: Arc<BoundedBuffer<u8>>) -> Self {
        let partial = Vec::with_capacity(format.packet_len);
        Self {
            format,
            buffer,
            building: false,
            partial,
            discarded: 0,
        }
    }

    /// Candidates discarded so far because of a bad length or leading byte.
    pub fn discarded_packets(&self) -> u64 {
        self.discarded
    }

    /// Consume available bytes and return the next complete packet, if any.
    ///
    /// Non-blocking: uses only `try_pop` and is intended to be called from
    /// the per-frame processing path. Returns `None` when the buffer runs
    /// dry before a full packet is assembled; state carries over to the
    /// next call.
    ///
    /// If the buffer starves mid-candidate, accumulation is abandoned in
    /// favor of a fresh start-symbol scan on the next call. This trades up
    /// to two packets around the starved candidate for a simpler state
    /// machine; acceptable because stale data is being discarded anyway.
    pub fn poll(&mut self) -> Option<RawPacket> {
        loop {
            let Some(byte) = self.buffer.try_pop() else {
                if !self.building {
                    return None;
                }
                if self.partial.len() < self.format.packet_len {
                    // Starved mid-candidate: rescan from the next start
                    // symbol on the following call.
                    self.building = false;
                    return None;
                }
                // A full-length candidate whose stop byte has not arrived
                // yet; the next scan swallows the late stop symbol.
                return self.finalize();
            };

            if !self.building {
                if byte != self.format.start_symbol {
                    continue;
                }
                self.building = true;
            }

            if byte == self.format.stop_symbol {
                let packet = self.finalize();
                if packet.is_some() {
                    return packet;
                }
                // Corrupted candidate discarded; keep scanning within this
                // call, there may be a clean packet behind it.
                continue;
            }

            self.partial.push(byte);
        }
    }

    fn finalize(&mut self) -> Option<RawPacket> {
        self.building = false;
        let candidate = std::mem::take(&mut self.partial);
        if candidate.len() == self.format.packet_len
            && candidate.first() == Some(&self.format.start_symbol)
        {
            return Some(candidate);
        }
        self.discarded += 1;
        debug!(
            len = candidate.len(),
            expected = self.format.packet_len,
            "discarding corrupt packet candidate"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_format() -> TelemetryFormat {
        // Small frame geometry keeps the test byte strings readable.
        TelemetryFormat {
            packet_len: 10,
            start_symbol: b'A',
            stop_symbol: b'C',
            conversion_factor: 1000,
            field_width: 2,
            accel_offsets: [1, 3, 5],
            rot_rate_offsets: [7, 7, 7],
        }
    }

    fn assembler_with_buffer() -> (PacketAssembler, Arc<BoundedBuffer<u8>>) {
        let format = test_format();
        let buffer = Arc::new(BoundedBuffer::new(format.buffer_capacity()));
        (PacketAssembler::new(format, Arc::clone(&buffer)), buffer)
    }

    fn feed(buffer: &BoundedBuffer<u8>, bytes: &[u8]) {
        for &b in bytes {
            assert!(buffer.try_push(b), "test overfilled the ingest buffer");
        }
    }

    #[test]
    fn test_extracts_packets_around_noise() {
        let (mut assembler, buffer) = assembler_with_buffer();

        feed(&buffer, b"XAabcdefghiC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Aabcdefghi"[..]));
        assert_eq!(assembler.poll(), None);

        feed(&buffer, b"YAjklmnopqrC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Ajklmnopqr"[..]));
        assert_eq!(assembler.discarded_packets(), 0);
    }

    #[test]
    fn test_back_to_back_packets_in_one_poll_cycle() {
        let (mut assembler, buffer) = assembler_with_buffer();

        // Two packets plus stops is 22 bytes > capacity 19, so feed and
        // drain in producer/consumer alternation like the live pipeline.
        feed(&buffer, b"AabcdefghiC");
        let first = assembler.poll();
        feed(&buffer, b"AjklmnopqrC");
        let second = assembler.poll();

        assert_eq!(first.as_deref(), Some(&b"Aabcdefghi"[..]));
        assert_eq!(second.as_deref(), Some(&b"Ajklmnopqr"[..]));
    }

    #[test]
    fn test_short_candidate_costs_only_itself() {
        let (mut assembler, buffer) = assembler_with_buffer();

        feed(&buffer, b"AabcdefghiC");
        assert!(assembler.poll().is_some());

        // Truncated frame: stop symbol arrives too early.
        feed(&buffer, b"AxyC");
        assert_eq!(assembler.poll(), None);
        assert_eq!(assembler.discarded_packets(), 1);

        feed(&buffer, b"AjklmnopqrC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Ajklmnopqr"[..]));
    }

    #[test]
    fn test_tampered_lead_byte_costs_only_itself() {
        let (mut assembler, buffer) = assembler_with_buffer();

        feed(&buffer, b"AabcdefghiC");
        assert!(assembler.poll().is_some());

        // Flipped start symbol: nothing in this frame matches the scan.
        feed(&buffer, b"BabcdefghiC");
        assert_eq!(assembler.poll(), None);

        feed(&buffer, b"AjklmnopqrC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Ajklmnopqr"[..]));
    }

    #[test]
    fn test_overlong_candidate_discarded() {
        let (mut assembler, buffer) = assembler_with_buffer();

        feed(&buffer, b"AabcdefghijkC");
        assert_eq!(assembler.poll(), None);
        assert_eq!(assembler.discarded_packets(), 1);

        feed(&buffer, b"AjklmnopqrC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Ajklmnopqr"[..]));
    }

    #[test]
    fn test_corrupt_then_valid_within_one_poll() {
        let (mut assembler, buffer) = assembler_with_buffer();

        // Short frame directly followed by a valid one, all available at
        // once: the valid frame must still come out of the same poll.
        feed(&buffer, b"AxCAabcdefghiC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Aabcdefghi"[..]));
        assert_eq!(assembler.discarded_packets(), 1);
    }

    #[test]
    fn test_full_length_candidate_emitted_on_starved_stop() {
        let (mut assembler, buffer) = assembler_with_buffer();

        // All ten bytes present but the stop symbol not yet received.
        feed(&buffer, b"Aabcdefghi");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Aabcdefghi"[..]));

        // The late stop byte is swallowed by the next scan.
        feed(&buffer, b"CAjklmnopqrC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Ajklmnopqr"[..]));
    }

    #[test]
    fn test_noise_only_yields_nothing() {
        let (mut assembler, buffer) = assembler_with_buffer();
        feed(&buffer, b"xyzxyzxyz");
        assert_eq!(assembler.poll(), None);
        assert_eq!(assembler.poll(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_starved_candidate_forces_rescan() {
        let (mut assembler, buffer) = assembler_with_buffer();

        // Four bytes of a frame, then the link goes quiet.
        feed(&buffer, b"Aabc");
        assert_eq!(assembler.poll(), None);

        // The frame after the gap is sacrificed to realignment...
        feed(&buffer, b"AjklmnopqrC");
        assert_eq!(assembler.poll(), None);

        // ...and the stream is clean again from the next frame on.
        feed(&buffer, b"AstuvwxyzzC");
        assert_eq!(assembler.poll().as_deref(), Some(&b"Astuvwxyzz"[..]));
    }

    proptest! {
        /// Well-formed frames interleaved with bounded non-start noise all
        /// survive assembly, in order, whatever the noise phase.
        #[test]
        fn prop_noise_never_costs_a_wellformed_packet(
            payloads in proptest::collection::vec(
                proptest::collection::vec(0x61u8..0x7a, 9),
                1..8,
            ),
            noise in proptest::collection::vec(
                proptest::collection::vec(
                    (0u8..255).prop_filter("non-matching", |b| *b != b'A'),
                    0..10,
                ),
                8,
            ),
        ) {
            let (mut assembler, buffer) = assembler_with_buffer();
            let mut emitted = Vec::new();

            for (i, payload) in payloads.iter().enumerate() {
                // Noise gap, drained separately the way the live consumer
                // would see it between frames.
                feed(&buffer, &noise[i]);
                while let Some(p) = assembler.poll() {
                    emitted.push(p);
                }

                let mut frame = vec![b'A'];
                frame.extend_from_slice(payload);
                frame.push(b'C');
                feed(&buffer, &frame);
                while let Some(p) = assembler.poll() {
                    emitted.push(p);
                }
            }

            let expected: Vec<Vec<u8>> = payloads
                .iter()
                .map(|p| {
                    let mut frame = vec![b'A'];
                    frame.extend_from_slice(p);
                    frame
                })
                .collect();
            prop_assert_eq!(emitted, expected);
        }
    }
}
