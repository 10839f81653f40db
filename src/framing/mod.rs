//! Stream framing
//!
//! Reconstructs discrete application messages from the raw byte stream of the
//! source socket. Two interchangeable strategies exist, chosen once from the
//! configuration:
//!
//! - [`BinaryFrameDecoder`] - `0x02 <payload> 0x03` control-byte framing
//! - [`LineFrameDecoder`] - newline-delimited text, trailing `\r` stripped
//!
//! Decoders own their accumulator. Feeding a chunk appends it, extracts every
//! complete frame and keeps only the trailing partial frame.

pub mod binary;
pub mod text;

pub use binary::BinaryFrameDecoder;
pub use text::LineFrameDecoder;

use serde::{Deserialize, Serialize};

/// Start-of-frame control byte (STX)
pub const FRAME_START: u8 = 0x02;
/// End-of-frame control byte (ETX)
pub const FRAME_END: u8 = 0x03;

/// Framing strategy, fixed for the process lifetime
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FramingMode {
    #[default]
    Binary,
    Text,
}

/// Output of one decode pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Complete messages in stream order
    pub messages: Vec<String>,
    /// Frames that were delimited but carried nothing to forward
    /// (end marker without start marker, or an empty line)
    pub discarded: usize,
}

/// Incremental frame decoder fed with arbitrary chunk boundaries
pub trait FrameDecoder: Send {
    /// Append `chunk` to the accumulator and extract all complete frames
    fn decode(&mut self, chunk: &[u8]) -> Decoded;

    /// Drop any partial frame held in the accumulator
    fn reset(&mut self);

    /// Number of undelimited bytes currently held
    fn buffered_len(&self) -> usize;
}

/// Build the decoder for a framing mode
pub fn decoder_for(mode: FramingMode) -> Box<dyn FrameDecoder> {
    match mode {
        FramingMode::Binary => Box::new(BinaryFrameDecoder::new()),
        FramingMode::Text => Box::new(LineFrameDecoder::new()),
    }
}
