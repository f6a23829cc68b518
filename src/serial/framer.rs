//! # Line Framer
//!
//! Splits the raw serial byte stream into newline-terminated text lines.
//!
//! Bytes accumulate in a [`BytesMut`] until a `\n` arrives. A trailing `\r`
//! is dropped. Lines that are not valid UTF-8, or that grow past the
//! configured limit before a newline shows up, are reported as
//! [`FrameError`] so the caller can skip them without losing sync.

use bytes::BytesMut;
use thiserror::Error;

/// Framing failure for a single line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Line bytes are not valid UTF-8
    #[error("invalid UTF-8 in {len}-byte line")]
    InvalidUtf8 { len: usize },

    /// Line exceeded the maximum length and was discarded
    #[error("line exceeded {max} bytes ({len} bytes discarded)")]
    TooLong { len: usize, max: usize },
}

/// One framed line, or the reason it could not be framed
pub type RawLine = std::result::Result<String, FrameError>;

/// Newline framer over an accumulating byte buffer
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_line_len: usize,
    /// Bytes thrown away from an overlong line still waiting for its newline
    discarded: Option<usize>,
}

impl LineFramer {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_line_len.min(4096)),
            max_line_len,
            discarded: None,
        }
    }

    /// Buffer to read new bytes into
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of buffered bytes not yet framed
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete line, if one is buffered
    pub fn next_line(&mut self) -> Option<RawLine> {
        let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
            if self.buf.len() > self.max_line_len {
                let dropped = self.buf.len();
                self.buf.clear();
                *self.discarded.get_or_insert(0) += dropped;
            }
            return None;
        };

        let mut line = self.buf.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        if let Some(dropped) = self.discarded.take() {
            return Some(Err(FrameError::TooLong {
                len: dropped + line.len(),
                max: self.max_line_len,
            }));
        }

        if line.len() > self.max_line_len {
            return Some(Err(FrameError::TooLong {
                len: line.len(),
                max: self.max_line_len,
            }));
        }

        Some(
            String::from_utf8(line.to_vec())
                .map_err(|_| FrameError::InvalidUtf8 { len: line.len() }),
        )
    }
}
