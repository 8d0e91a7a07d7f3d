//! Line-framed decoder
//!
//! Handles partial lines and split multi-byte characters across chunk boundaries.

use tracing::{debug, warn};

/// Prefix that marks a line as a data frame
pub const DATA_MARKER: &str = "data:";

/// Incremental decoder for one response body.
///
/// Bytes are buffered until a `\n` arrives; only then is the line decoded.
/// A newline byte never occurs inside a UTF-8 sequence, so a complete line
/// always carries complete characters no matter where chunks were cut.
#[derive(Debug)]
pub struct FrameDecoder {
    /// Undecoded tail of the most recent chunk
    pending: Vec<u8>,
    /// Prefix a line must start with to count as a frame
    marker: String,
    /// Bytes received counter
    bytes_received: usize,
    /// Frames emitted counter
    frames_emitted: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_marker(DATA_MARKER)
    }

    /// Create a decoder that recognises a custom frame marker
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            pending: Vec::new(),
            marker: marker.into(),
            bytes_received: 0,
            frames_emitted: 0,
        }
    }

    /// Feed one chunk and drain every frame it completes, in arrival order.
    ///
    /// A line whose terminator has not arrived yet stays buffered.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.bytes_received += chunk.len();
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let line = &self.pending[consumed..end];
            // CRLF terminators: the carriage return belongs to the line break
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if let Some(payload) = self.payload(line) {
                frames.push(payload);
            }
            consumed = end + 1;
        }
        self.pending.drain(..consumed);
        self.frames_emitted += frames.len();

        debug!(
            "Frame chunk: {} bytes (total: {} bytes), {} frames, {} bytes pending",
            chunk.len(),
            self.bytes_received,
            frames.len(),
            self.pending.len()
        );
        frames
    }

    /// End of stream. An unterminated remainder is not a frame and is dropped.
    ///
    /// Returns the number of dropped bytes.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            warn!(
                "Dropping {} unterminated bytes at end of stream ({} frames emitted)",
                dropped, self.frames_emitted
            );
        }
        self.pending.clear();
        dropped
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn frames_emitted(&self) -> usize {
        self.frames_emitted
    }

    fn payload(&self, line: &[u8]) -> Option<String> {
        // No trimming: whitespace in the payload is part of the text
        line.strip_prefix(self.marker.as_bytes())
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
