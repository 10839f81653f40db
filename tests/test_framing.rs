//! Frame decoder behavior across arbitrary chunk boundaries
//!
//! The socket may split or merge frames at any byte. Whatever the chunking,
//! the decoded messages must be the same and come out in stream order.

use proptest::prelude::*;
use proptest::sample::Index;
use socket_queue_bridge::framing::{
    decoder_for, BinaryFrameDecoder, FrameDecoder, FramingMode, LineFrameDecoder,
};

/// Split `stream` at the given positions and feed every piece in order
fn feed_chunked(decoder: &mut dyn FrameDecoder, stream: &[u8], cuts: &[Index]) -> (Vec<String>, usize) {
    let mut positions: Vec<usize> = cuts.iter().map(|cut| cut.index(stream.len() + 1)).collect();
    positions.push(0);
    positions.push(stream.len());
    positions.sort_unstable();
    positions.dedup();

    let mut messages = Vec::new();
    let mut discarded = 0;
    for window in positions.windows(2) {
        let decoded = decoder.decode(&stream[window[0]..window[1]]);
        messages.extend(decoded.messages);
        discarded += decoded.discarded;
    }
    (messages, discarded)
}

fn binary_stream(payloads: &[String]) -> Vec<u8> {
    let mut stream = Vec::new();
    for payload in payloads {
        stream.push(0x02);
        stream.extend_from_slice(payload.as_bytes());
        stream.push(0x03);
    }
    stream
}

#[test]
fn test_binary_end_marker_without_start_is_discarded() {
    let mut decoder = BinaryFrameDecoder::new();
    let decoded = decoder.decode(b"garbage\x03\x02ok\x03");
    assert_eq!(decoded.messages, vec!["ok"]);
    assert_eq!(decoded.discarded, 1);
}

#[test]
fn test_binary_bytes_before_start_marker_are_ignored() {
    let mut decoder = BinaryFrameDecoder::new();
    let decoded = decoder.decode(b"noise\x02payload\x03");
    assert_eq!(decoded.messages, vec!["payload"]);
    assert_eq!(decoded.discarded, 0);
}

#[test]
fn test_binary_first_start_marker_wins() {
    let mut decoder = BinaryFrameDecoder::new();
    let decoded = decoder.decode(b"\x02a\x02b\x03");
    assert_eq!(decoded.messages, vec!["a\u{2}b"]);
}

#[test]
fn test_binary_empty_frame_is_forwarded() {
    let mut decoder = BinaryFrameDecoder::new();
    let decoded = decoder.decode(b"\x02\x03");
    assert_eq!(decoded.messages, vec![String::new()]);
}

#[test]
fn test_binary_high_bytes_map_one_to_one() {
    let mut decoder = BinaryFrameDecoder::new();
    let decoded = decoder.decode(&[0x02, 0xE9, 0xFF, 0x03]);
    assert_eq!(decoded.messages, vec!["\u{E9}\u{FF}"]);
}

#[test]
fn test_text_crlf_and_empty_lines() {
    let mut decoder = LineFrameDecoder::new();
    let decoded = decoder.decode(b"A\r\nB\n\n");
    assert_eq!(decoded.messages, vec!["A", "B"]);
    assert_eq!(decoded.discarded, 1);
    assert_eq!(decoder.buffered_len(), 0);
}

#[test]
fn test_text_partial_line_is_kept_until_newline() {
    let mut decoder = LineFrameDecoder::new();
    assert!(decoder.decode(b"temp=2").messages.is_empty());
    assert_eq!(decoder.buffered_len(), 6);

    let decoded = decoder.decode(b"1.5\n");
    assert_eq!(decoded.messages, vec!["temp=21.5"]);
}

#[test]
fn test_text_multibyte_character_split_across_chunks() {
    let mut decoder = LineFrameDecoder::new();
    let bytes = "température\n".as_bytes();
    let split = bytes.iter().position(|&b| b >= 0x80).unwrap() + 1;

    assert!(decoder.decode(&bytes[..split]).messages.is_empty());
    let decoded = decoder.decode(&bytes[split..]);
    assert_eq!(decoded.messages, vec!["température"]);
}

#[test]
fn test_reset_drops_partial_frame() {
    for mode in [FramingMode::Binary, FramingMode::Text] {
        let mut decoder = decoder_for(mode);
        decoder.decode(b"\x02partial");
        assert!(decoder.buffered_len() > 0);

        decoder.reset();
        assert_eq!(decoder.buffered_len(), 0);
        assert!(decoder.decode(b"\x03").messages.is_empty());
    }
}

proptest! {
    #[test]
    fn binary_chunking_does_not_change_messages(
        payloads in prop::collection::vec("[ -~]{0,24}", 0..12),
        cuts in prop::collection::vec(any::<Index>(), 0..16),
    ) {
        let stream = binary_stream(&payloads);
        let mut decoder = BinaryFrameDecoder::new();

        let (messages, discarded) = feed_chunked(&mut decoder, &stream, &cuts);

        prop_assert_eq!(messages, payloads);
        prop_assert_eq!(discarded, 0);
        prop_assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn text_chunking_does_not_change_messages(
        lines in prop::collection::vec("[a-zA-Z0-9 =.é]{1,24}", 0..12),
        crlf in any::<bool>(),
        cuts in prop::collection::vec(any::<Index>(), 0..16),
    ) {
        let terminator = if crlf { "\r\n" } else { "\n" };
        let stream: String = lines.iter().map(|line| format!("{line}{terminator}")).collect();
        let mut decoder = LineFrameDecoder::new();

        let (messages, _) = feed_chunked(&mut decoder, stream.as_bytes(), &cuts);

        let expected: Vec<String> = lines
            .iter()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        prop_assert_eq!(messages, expected);
        prop_assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn binary_trailing_partial_frame_stays_buffered(
        payload in "[ -~]{1,24}",
        tail in "[ -~]{0,24}",
    ) {
        let mut stream = binary_stream(std::slice::from_ref(&payload));
        stream.push(0x02);
        stream.extend_from_slice(tail.as_bytes());

        let mut decoder = BinaryFrameDecoder::new();
        let decoded = decoder.decode(&stream);

        prop_assert_eq!(decoded.messages, vec![payload]);
        prop_assert_eq!(decoder.buffered_len(), tail.len() + 1);
    }
}
