//! Per-stream stitching: pull contiguous bytes from the reassembly
//! buffer, run the protocol parser, and emit completed messages.
//!
//! One stitcher owns one connection/direction stream. Parsing failures
//! are not fatal: invalid bytes at the cursor mean the stream
//! desynchronized (dropped capture events), so the stitcher advances to
//! the next plausible frame boundary and keeps going.

use crate::message::{Message, MessageType, ParseResult};
use crate::protocols::Protocol;
use crate::stream_buffer::StreamBuffer;
use tracing::debug;

/// Counters describing one stream's stitching history.
#[derive(Debug, Default, Clone, Copy)]
pub struct StitchStats {
    /// Messages successfully decoded.
    pub messages: u64,
    /// Resynchronizations forced by invalid bytes at the cursor.
    pub invalid_resyncs: u64,
    /// Bytes abandoned to unrecoverable gaps.
    pub gap_bytes_skipped: u64,
}

/// Drives one directional byte stream through its protocol parser.
pub struct Stitcher {
    buffer: StreamBuffer,
    protocol: Protocol,
    msg_type: MessageType,
    stats: StitchStats,
}

impl Stitcher {
    pub fn new(protocol: Protocol, msg_type: MessageType, buffer_capacity: usize) -> Self {
        Self {
            buffer: StreamBuffer::new(buffer_capacity),
            protocol,
            msg_type,
            stats: StitchStats::default(),
        }
    }

    /// Insert a captured fragment. Call [`Self::stitch`] afterwards to
    /// drain whatever became parseable.
    pub fn add_fragment(&mut self, pos: u64, data: &[u8], timestamp_ns: u64) {
        self.buffer.add(pos, data, timestamp_ns);
    }

    /// Decode as many complete messages as the buffered bytes allow.
    ///
    /// Stops when the stream needs more data. Gaps at the cursor are
    /// skipped (the missing range is lost capture, waiting will not fill
    /// it once later bytes exist and nothing in between arrives), and
    /// invalid bytes trigger a scan to the next frame boundary.
    pub fn stitch(&mut self) -> Vec<Message> {
        let mut out = Vec::new();

        loop {
            if self.buffer.contiguous_prefix().is_empty() {
                if self.buffer.has_gap_at_head() {
                    self.stats.gap_bytes_skipped += self.buffer.skip_gap();
                    continue;
                }
                break;
            }

            let prefix = self.buffer.contiguous_prefix();
            match self.protocol.parse_message(self.msg_type, prefix) {
                ParseResult::Complete(mut msg, consumed) => {
                    msg.timestamp_ns = self.buffer.timestamp_at_head().unwrap_or(0);
                    self.buffer.advance(consumed);
                    self.stats.messages += 1;
                    out.push(msg);
                }
                ParseResult::NeedsMoreData => break,
                ParseResult::Invalid => {
                    // The marker search starts one byte in so a bad
                    // frame at a marker byte cannot stall progress.
                    let skip = self
                        .protocol
                        .find_frame_boundary(self.msg_type, prefix, 1)
                        .unwrap_or(prefix.len());
                    debug!(
                        protocol = %self.protocol,
                        skip,
                        "invalid bytes at cursor, resynchronizing"
                    );
                    self.buffer.advance(skip);
                    self.stats.invalid_resyncs += 1;
                }
            }
        }

        out
    }

    /// Stitching counters for diagnostics.
    pub fn stats(&self) -> StitchStats {
        self.stats
    }

    /// Bytes currently held in the reassembly buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.buffered()
    }
}
