//! # Line codec
//!
//! Splits a byte stream into newline delimited frames. Blank lines are skipped. A frame which
//! grows beyond the maximum length is reported once and then discarded up to the next
//! delimiter, so the codec resynchronises on the following message.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::msg::MSG_DELIMITER;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct LineCodec {
    buf: Vec<u8>,

    max_frame_len: usize,

    /// Set while skipping the tail of an oversized frame.
    discarding: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Frame of at least {0} bytes exceeds the maximum frame length")]
    TooLong(usize),

    #[error("Frame is not valid UTF-8")]
    NonUtf8,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LineCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_len,
            discarding: false,
        }
    }

    /// Append received bytes to the internal buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, without its delimiter.
    ///
    /// Returns `None` when no complete frame is buffered.
    pub fn next_frame(&mut self) -> Option<Result<String, FrameError>> {
        loop {
            let delim_pos = self.buf.iter().position(|b| *b == MSG_DELIMITER);

            if self.discarding {
                match delim_pos {
                    Some(pos) => {
                        self.buf.drain(..=pos);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        self.buf.clear();
                        return None;
                    }
                }
            }

            match delim_pos {
                Some(pos) => {
                    let mut frame: Vec<u8> = self.buf.drain(..=pos).collect();
                    frame.pop();
                    if frame.last() == Some(&b'\r') {
                        frame.pop();
                    }

                    if frame.len() > self.max_frame_len {
                        return Some(Err(FrameError::TooLong(frame.len())));
                    }

                    if frame.iter().all(|b| b.is_ascii_whitespace()) {
                        continue;
                    }

                    return Some(String::from_utf8(frame).map_err(|_| FrameError::NonUtf8));
                }
                None => {
                    if self.buf.len() > self.max_frame_len {
                        let len = self.buf.len();
                        self.buf.clear();
                        self.discarding = true;
                        return Some(Err(FrameError::TooLong(len)));
                    }
                    return None;
                }
            }
        }
    }

    /// Drop all buffered bytes, e.g. when the underlying connection is replaced.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Number of bytes waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
