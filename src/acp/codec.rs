//! NDJSON framing for ACP agent streams.
//!
//! Inbound: one UTF-8 line per message, `\n`-terminated, at most
//! [`MAX_LINE_BYTES`]. A trailing `\r` is stripped, blank lines are
//! swallowed, and oversize or non-UTF-8 lines are discarded with a warning,
//! so the reader only ever sees candidate JSON text.
//!
//! Outbound: a [`serde_json::Value`] is serialized compactly and followed by
//! a single `\n`. Compact serialization never emits raw newlines, so one value
//! is always exactly one line.

use std::io::ErrorKind;

use bytes::{BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use tracing::warn;

use crate::{AppError, Result};

/// Maximum inbound line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Bidirectional NDJSON codec for agent stdio.
///
/// Line splitting and the length cap are delegated to [`LinesCodec`].
/// An oversize line is dropped up to its newline and decoding resumes with
/// the next line. A line that is not valid UTF-8 has already been consumed by
/// the time [`LinesCodec`] rejects it and is dropped the same way. Decoder
/// errors end a [`FramedRead`] stream, so neither case is reported as one.
///
/// [`FramedRead`]: tokio_util::codec::FramedRead
#[derive(Debug)]
pub struct AcpCodec {
    lines: LinesCodec,
    max_line: usize,
    discarded: u64,
}

impl AcpCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line cap.
    #[must_use]
    pub fn with_max_line(max: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max),
            max_line: max,
            discarded: 0,
        }
    }

    fn next_line(&mut self, src: &mut BytesMut, at_eof: bool) -> Result<Option<String>> {
        loop {
            let decoded = if at_eof {
                self.lines.decode_eof(src)
            } else {
                self.lines.decode(src)
            };

            match decoded {
                Ok(None) => return Ok(None),
                Ok(Some(raw)) => {
                    let trimmed = raw.trim_end_matches('\r');
                    if trimmed.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(trimmed.to_owned()));
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(max_line = self.max_line, "acp codec: line too long, discarding");
                    self.discarded += 1;
                }
                Err(LinesCodecError::Io(e)) if e.kind() == ErrorKind::InvalidData => {
                    warn!(error = %e, "acp codec: line is not valid UTF-8, discarding");
                    self.discarded += 1;
                }
                Err(LinesCodecError::Io(e)) => return Err(AppError::Io(e.to_string())),
            }
        }
    }

    /// Number of oversize or non-UTF-8 lines dropped so far.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Default for AcpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AcpCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.next_line(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.next_line(src, true)
    }
}

impl Encoder<Value> for AcpCodec {
    type Error = AppError;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<()> {
        let bytes = serde_json::to_vec(&item)
            .map_err(|e| AppError::Acp(format!("failed to serialise outbound message: {e}")))?;
        dst.reserve(bytes.len() + 1);
        dst.put_slice(&bytes);
        dst.put_u8(b'\n');
        Ok(())
    }
}
