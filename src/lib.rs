//! restitch: reconstructs application-level protocol messages from raw
//! byte fragments captured off live sockets by kernel instrumentation.
//!
//! Captured fragments arrive asynchronously, out of order, overlapping,
//! or missing. This crate turns them into ordered, fully decoded
//! messages with bounded memory:
//! - Per-stream positional reassembly with gap tracking and capped
//!   buffering
//! - A stateless, resumable parsing contract shared by all protocols
//! - A RESP (Redis) parser with a declarative command table
//! - A connection tracker and async ingestion pipeline
//!
//! Kernel-side capture, process tracking, and result export are
//! external collaborators; this crate only consumes position-tagged
//! byte fragments and produces decoded messages.

pub mod config;
pub mod event;
pub mod message;
pub mod protocols;
pub mod stitcher;
pub mod stream_buffer;
pub mod tracker;

pub use event::{CaptureEvent, ConnId};
pub use message::{Message, MessageType, ParseResult};
pub use protocols::Protocol;
pub use stitcher::{StitchStats, Stitcher};
pub use stream_buffer::StreamBuffer;
pub use tracker::{run_pipeline, ConnectionTracker, Record};
