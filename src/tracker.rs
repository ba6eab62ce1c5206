//! Multi-connection tracking and the async ingestion loop.
//!
//! Routes capture events to per-stream stitchers. Each connection owns
//! two independent streams (request and response direction); streams of
//! different connections share nothing, so a tracker can be sharded
//! across workers by connection id if one task is not enough.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::event::{CaptureEvent, ConnId};
use crate::message::{Message, MessageType};
use crate::protocols::Protocol;
use crate::stitcher::Stitcher;

/// One decoded message attributed to its connection and direction.
#[derive(Debug, Clone)]
pub struct Record {
    pub conn: ConnId,
    pub direction: MessageType,
    pub message: Message,
}

/// Tracks every live connection's streams and feeds their stitchers.
pub struct ConnectionTracker {
    streams: HashMap<(ConnId, MessageType), Stitcher>,
    protocols: HashMap<ConnId, Protocol>,
    default_protocol: Protocol,
    buffer_capacity: usize,
}

impl ConnectionTracker {
    pub fn new(default_protocol: Protocol, buffer_capacity: usize) -> Self {
        Self {
            streams: HashMap::new(),
            protocols: HashMap::new(),
            default_protocol,
            buffer_capacity,
        }
    }

    /// Apply one capture event, returning any messages it completed.
    pub fn handle_event(&mut self, event: CaptureEvent) -> Vec<Record> {
        match event {
            CaptureEvent::Opened { conn, protocol } => {
                debug!(conn, %protocol, "connection opened");
                self.protocols.insert(conn, protocol);
                Vec::new()
            }
            CaptureEvent::Data {
                conn,
                direction,
                pos,
                data,
                timestamp_ns,
            } => {
                trace!(conn, ?direction, pos, len = data.len(), "data event");
                // Data can outrun the open event; register lazily.
                let protocol = *self
                    .protocols
                    .entry(conn)
                    .or_insert(self.default_protocol);
                let capacity = self.buffer_capacity;
                let stitcher = self
                    .streams
                    .entry((conn, direction))
                    .or_insert_with(|| Stitcher::new(protocol, direction, capacity));

                stitcher.add_fragment(pos, &data, timestamp_ns);
                stitcher
                    .stitch()
                    .into_iter()
                    .map(|message| Record {
                        conn,
                        direction,
                        message,
                    })
                    .collect()
            }
            CaptureEvent::Closed { conn } => {
                debug!(conn, "connection closed");
                self.protocols.remove(&conn);
                self.streams.retain(|(c, _), _| *c != conn);
                Vec::new()
            }
        }
    }

    /// Number of streams currently holding state.
    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }
}

/// Ingestion loop: capture events in, decoded records out.
///
/// The tracker lives inside the task, so no stream is ever touched by
/// two workers. Runs until the event sender hangs up; stops early if
/// the record receiver is dropped.
pub async fn run_pipeline(
    default_protocol: Protocol,
    buffer_capacity: usize,
    mut events: mpsc::Receiver<CaptureEvent>,
    records: mpsc::Sender<Record>,
) {
    let mut tracker = ConnectionTracker::new(default_protocol, buffer_capacity);

    while let Some(event) = events.recv().await {
        for record in tracker.handle_event(event) {
            if records.send(record).await.is_err() {
                debug!("record receiver dropped, stopping pipeline");
                return;
            }
        }
    }

    info!(
        active_streams = tracker.active_streams(),
        "capture stream ended"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_buffer::DEFAULT_CAPACITY;
    use bytes::Bytes;

    fn data_event(conn: ConnId, direction: MessageType, pos: u64, data: &[u8]) -> CaptureEvent {
        CaptureEvent::Data {
            conn,
            direction,
            pos,
            data: Bytes::copy_from_slice(data),
            timestamp_ns: pos,
        }
    }

    #[test]
    fn test_lazy_stream_registration() {
        let mut tracker = ConnectionTracker::new(Protocol::Resp, DEFAULT_CAPACITY);

        let records = tracker.handle_event(data_event(7, MessageType::Response, 0, b"+OK\r\n"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].conn, 7);
        assert_eq!(records[0].message.payload, "OK");
        assert_eq!(tracker.active_streams(), 1);
    }

    #[test]
    fn test_directions_are_independent_streams() {
        let mut tracker = ConnectionTracker::new(Protocol::Resp, DEFAULT_CAPACITY);

        // Same positions on both directions of one connection.
        let req = tracker.handle_event(data_event(1, MessageType::Request, 0, b"*1\r\n$4\r\nTIME\r\n"));
        let resp = tracker.handle_event(data_event(1, MessageType::Response, 0, b"+OK\r\n"));

        assert_eq!(req[0].message.command, "TIME");
        assert_eq!(resp[0].message.payload, "OK");
        assert_eq!(tracker.active_streams(), 2);
    }

    #[test]
    fn test_connections_are_isolated() {
        let mut tracker = ConnectionTracker::new(Protocol::Resp, DEFAULT_CAPACITY);

        // Connection 1 is mid-message; connection 2 completes fine.
        assert!(tracker
            .handle_event(data_event(1, MessageType::Response, 0, b"$11\r\nbulk"))
            .is_empty());
        let records = tracker.handle_event(data_event(2, MessageType::Response, 0, b"+OK\r\n"));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_close_drops_stream_state() {
        let mut tracker = ConnectionTracker::new(Protocol::Resp, DEFAULT_CAPACITY);

        tracker.handle_event(data_event(1, MessageType::Response, 0, b"$11\r\nbulk"));
        assert_eq!(tracker.active_streams(), 1);

        tracker.handle_event(CaptureEvent::Closed { conn: 1 });
        assert_eq!(tracker.active_streams(), 0);

        // A late retransmission starts a fresh stream at pos 0.
        let records = tracker.handle_event(data_event(1, MessageType::Response, 0, b"+OK\r\n"));
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (record_tx, mut record_rx) = mpsc::channel(16);

        let pipeline = tokio::spawn(run_pipeline(
            Protocol::Resp,
            DEFAULT_CAPACITY,
            event_rx,
            record_tx,
        ));

        event_tx
            .send(CaptureEvent::Opened {
                conn: 3,
                protocol: Protocol::Resp,
            })
            .await
            .unwrap();

        // One request split into out-of-order fragments.
        let wire = b"*2\r\n$3\r\nget\r\n$3\r\nfoo\r\n";
        event_tx
            .send(data_event(3, MessageType::Request, 10, &wire[10..]))
            .await
            .unwrap();
        event_tx
            .send(data_event(3, MessageType::Request, 0, &wire[..10]))
            .await
            .unwrap();
        drop(event_tx);

        let record = record_rx.recv().await.expect("one record");
        assert_eq!(record.conn, 3);
        assert_eq!(record.message.command, "GET");
        assert_eq!(record.message.payload, r#"{"key":"foo"}"#);

        assert!(record_rx.recv().await.is_none());
        pipeline.await.unwrap();
    }
}
