//! Protocol-agnostic message model shared by every protocol parser.
//!
//! A parser turns a byte view into a [`Message`] plus a consumed byte
//! count. The result type encodes the three terminal states of one
//! parsing attempt: complete, needs more data, or invalid.

/// Direction hint for a parsed stream.
///
/// Capture instrumentation knows which endpoint wrote the bytes, so each
/// stream is parsed as either the request side or the response side of
/// the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Bytes written by the client toward the server.
    Request,
    /// Bytes written by the server toward the client.
    Response,
}

/// A fully decoded protocol message.
///
/// Populated by a protocol parser on success; the stitcher fills in the
/// capture timestamp from the stream buffer before handing the message
/// downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Rendered value. Scalars render as raw text, composites as JSON.
    pub payload: String,
    /// Canonical uppercase command name, empty when the protocol or
    /// direction carries no command.
    pub command: String,
    /// Set when the message is a publish notification delivered on a
    /// subscribed channel rather than a reply to a request.
    pub is_published_message: bool,
    /// Capture timestamp of the first byte of the message, in
    /// nanoseconds.
    pub timestamp_ns: u64,
}

/// Result of one parsing attempt over a byte view.
///
/// The contract binding every protocol parser:
/// - The parser is a pure function of the supplied bytes; it keeps no
///   state between invocations and never reads past the view.
/// - `Complete` carries the number of bytes the message occupied; the
///   caller advances its cursor by exactly that amount.
/// - On `NeedsMoreData` the view's prefix is a valid but incomplete
///   instance of the grammar; retry once more bytes arrive.
/// - On `Invalid` no extension of the view can ever parse; the caller
///   must resynchronize.
///
/// Nothing is consumed in the latter two cases.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// Successfully parsed a message spanning the given byte count.
    Complete(Message, usize),
    /// The view holds a valid but incomplete message.
    NeedsMoreData,
    /// The view can never become a valid message.
    Invalid,
}
