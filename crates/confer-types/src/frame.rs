//! Line framing for the live channel.
//!
//! Both ends speak newline-delimited JSON over `Framed<TcpStream, FrameCodec>`.
//! [`FrameCodec`] wraps [`LinesCodec`] with one difference: a line longer
//! than the limit comes out as [`Frame::Oversized`] instead of a decoder
//! error. `Framed` ends the stream after any decoder error, so surfacing the
//! overrun as a frame is what lets a connection skip it and keep reading.
//! `LinesCodec` itself discards the rest of the long line up to the next
//! newline.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// One decoded unit from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, terminator stripped.
    Line(String),
    /// A line exceeded the length limit and was discarded.
    Oversized,
}

/// Newline-delimited codec that survives oversized lines.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    lines: LinesCodec,
}

impl FrameCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }
}

fn classify(
    decoded: Result<Option<String>, LinesCodecError>,
) -> Result<Option<Frame>, LinesCodecError> {
    match decoded {
        Ok(line) => Ok(line.map(Frame::Line)),
        Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::Oversized)),
        Err(e) => Err(e),
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        classify(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        classify(self.lines.decode_eof(buf))
    }
}

impl<T: AsRef<str>> Encoder<T> for FrameCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.lines.encode(line, buf)
    }
}

// ============================================================================
// Tests
// ============================================================================
