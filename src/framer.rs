//! Splits an inbound byte stream into whole AMI frames on the `CRLFCRLF`
//! boundary.
//!
//! The framer itself does no I/O; it owns a growing buffer and is fed bytes
//! by whoever is reading the stream (see [`crate::connection::FrameReader`]).
//! This separation is what makes invariant 2 ("framer exactness" — the same
//! frames come out regardless of how the input bytes are chunked) testable
//! without a socket.

use bytes::BytesMut;

use crate::client::ClientError;

/// A single AMI message boundary: four bytes, `CR LF CR LF`.
const BOUNDARY: &[u8] = b"\r\n\r\n";

/// Default cap on a single frame's size before it is considered malformed.
/// The wire format has no fixed limit; this guards against a misbehaving or
/// malicious peer holding the buffer open forever.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Accumulates bytes and extracts complete frames from them.
pub struct Framer {
    buffer: BytesMut,
    max_frame_len: usize,
}

impl Framer {
    pub fn new() -> Self {
        Framer::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Framer {
            buffer: BytesMut::with_capacity(4096),
            max_frame_len,
        }
    }

    /// Appends freshly-read bytes to the buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// True if the buffer currently holds no unconsumed bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the first buffered line (through and including its `\n`),
    /// without consuming it, if a full line is present. Used only for banner
    /// detection, which has to inspect the first line before deciding
    /// whether it's part of the normal frame stream or not — peeking instead
    /// of removing means a line that turns out not to be a banner is simply
    /// left where it was, still in its original position at the front of the
    /// buffer, ready for `next_frame` to see.
    pub fn peek_line(&self) -> Option<&[u8]> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        Some(&self.buffer[..pos + 1])
    }

    /// Removes the first buffered line (through and including its `\n`). Only
    /// meant to be called right after `peek_line` confirmed one is there and
    /// it should be discarded (i.e. it was a banner).
    pub fn discard_line(&mut self) {
        if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            self.buffer.split_to(pos + 1);
        }
    }

    /// Extracts one complete frame (bytes before the boundary, boundary
    /// consumed but not returned) if the buffer contains one. Returns
    /// `MalformedMessage` if the buffer has grown past the cap without
    /// finding a boundary.
    pub fn next_frame(&mut self) -> Result<Option<BytesMut>, ClientError> {
        match find_boundary(&self.buffer) {
            Some(pos) => {
                let frame = self.buffer.split_to(pos);
                self.buffer.advance_past_boundary();
                Ok(Some(frame))
            }
            None if self.buffer.len() > self.max_frame_len => Err(ClientError::MalformedMessage(
                format!("frame exceeded {} bytes without a boundary", self.max_frame_len),
            )),
            None => Ok(None),
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Framer::new()
    }
}

fn find_boundary(buf: &[u8]) -> Option<usize> {
    if buf.len() < BOUNDARY.len() {
        return None;
    }
    buf.windows(BOUNDARY.len()).position(|w| w == BOUNDARY)
}

/// Small helper trait so `next_frame` can discard the boundary bytes it just
/// matched without the caller needing to know the boundary's length.
trait AdvancePastBoundary {
    fn advance_past_boundary(&mut self);
}

impl AdvancePastBoundary for BytesMut {
    fn advance_past_boundary(&mut self) {
        let _ = self.split_to(BOUNDARY.len());
    }
}
