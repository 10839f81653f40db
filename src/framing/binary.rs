//! STX/ETX binary framing

use super::{Decoded, FrameDecoder, FRAME_END, FRAME_START};
use bytes::{Buf, BytesMut};

const INITIAL_CAPACITY: usize = 4096;

/// Decodes `0x02 <payload> 0x03` frames.
///
/// The payload is the bytes between the first start marker preceding an end
/// marker and that end marker. Each payload byte becomes one character
/// (Latin-1), no multi-byte decoding is attempted. An end marker with no start
/// marker before it closes a malformed frame that is silently discarded.
pub struct BinaryFrameDecoder {
    accumulator: BytesMut,
}

impl BinaryFrameDecoder {
    pub fn new() -> Self {
        Self {
            accumulator: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// One byte per character
    fn payload_to_string(payload: &[u8]) -> String {
        payload.iter().map(|&b| char::from(b)).collect()
    }
}

impl Default for BinaryFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for BinaryFrameDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Decoded {
        self.accumulator.extend_from_slice(chunk);

        let mut decoded = Decoded::default();
        while let Some(end) = self.accumulator.iter().position(|&b| b == FRAME_END) {
            let frame = &self.accumulator[..end];
            match frame.iter().position(|&b| b == FRAME_START) {
                Some(start) => decoded
                    .messages
                    .push(Self::payload_to_string(&frame[start + 1..])),
                None => decoded.discarded += 1,
            }
            self.accumulator.advance(end + 1);
        }

        decoded
    }

    fn reset(&mut self) {
        self.accumulator.clear();
    }

    fn buffered_len(&self) -> usize {
        self.accumulator.len()
    }
}
