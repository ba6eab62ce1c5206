//! Capture-side event model.
//!
//! The kernel instrumentation collaborator reports connection lifecycle
//! and data events. Data events carry an absolute position in the
//! logical byte stream rather than arriving in order; reassembly is the
//! stream buffer's job.

use crate::message::MessageType;
use crate::protocols::Protocol;
use bytes::Bytes;

/// Identity of one traced connection, assigned by the capture
/// collaborator (e.g. derived from pid, fd, and a generation counter).
pub type ConnId = u64;

/// One event from the capture source.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A connection was opened and its protocol detected.
    Opened { conn: ConnId, protocol: Protocol },
    /// A slice of one directional byte stream.
    Data {
        conn: ConnId,
        direction: MessageType,
        /// Absolute byte offset of `data` in the logical stream.
        pos: u64,
        data: Bytes,
        /// Capture timestamp in nanoseconds.
        timestamp_ns: u64,
    },
    /// The connection was closed; buffered state can be dropped.
    Closed { conn: ConnId },
}
