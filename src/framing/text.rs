//! Newline-delimited text framing

use super::{Decoded, FrameDecoder};
use bytes::{Buf, BytesMut};

const INITIAL_CAPACITY: usize = 4096;

/// Decodes `<text>\n` lines.
///
/// Trailing carriage returns are stripped and empty lines are dropped. Bytes are
/// accumulated undecoded so a multi-byte UTF-8 sequence split across chunks is
/// reassembled before conversion; invalid sequences become U+FFFD.
pub struct LineFrameDecoder {
    accumulator: BytesMut,
}

impl LineFrameDecoder {
    pub fn new() -> Self {
        Self {
            accumulator: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    fn strip_carriage_returns(mut line: &[u8]) -> &[u8] {
        while let Some((&b'\r', rest)) = line.split_last() {
            line = rest;
        }
        line
    }
}

impl Default for LineFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for LineFrameDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Decoded {
        self.accumulator.extend_from_slice(chunk);

        let mut decoded = Decoded::default();
        while let Some(newline) = self.accumulator.iter().position(|&b| b == b'\n') {
            let line = Self::strip_carriage_returns(&self.accumulator[..newline]);
            if line.is_empty() {
                decoded.discarded += 1;
            } else {
                decoded
                    .messages
                    .push(String::from_utf8_lossy(line).into_owned());
            }
            self.accumulator.advance(newline + 1);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_and_empty_lines() {
        let mut decoder = LineFrameDecoder::new();
        let decoded = decoder.decode(b"A\r\nB\n\n");
        assert_eq!(decoded.messages, vec!["A", "B"]);
        assert_eq!(decoded.discarded, 1);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = LineFrameDecoder::new();
        assert!(decoder.decode(b"temp=2").messages.is_empty());
        assert!(decoder.decode(b"1.5\r").messages.is_empty());
        let decoded = decoder.decode(b"\nhum");
        assert_eq!(decoded.messages, vec!["temp=21.5"]);
        assert_eq!(decoder.buffered_len(), 3);
    }

    #[test]
    fn test_multiple_trailing_carriage_returns() {
        let mut decoder = LineFrameDecoder::new();
        let decoded = decoder.decode(b"x\r\r\n\r\n");
        assert_eq!(decoded.messages, vec!["x"]);
        assert_eq!(decoded.discarded, 1);
    }

    #[test]
    fn test_inner_carriage_return_kept() {
        let mut decoder = LineFrameDecoder::new();
        let decoded = decoder.decode(b"a\rb\n");
        assert_eq!(decoded.messages, vec!["a\rb"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut decoder = LineFrameDecoder::new();
        let bytes = "caf\u{e9}\n".as_bytes();
        let (head, tail) = bytes.split_at(4);
        assert!(decoder.decode(head).messages.is_empty());
        let decoded = decoder.decode(tail);
        assert_eq!(decoded.messages, vec!["caf\u{e9}"]);
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut decoder = LineFrameDecoder::new();
        decoder.decode(b"stale");
        decoder.reset();
        let decoded = decoder.decode(b"fresh\n");
        assert_eq!(decoded.messages, vec!["fresh"]);
    }
}
