//! Offline replay of capture dumps.
//!
//! Reads a JSON-lines dump of capture events and pumps it through the
//! reassembly pipeline, printing each decoded message. One event per
//! line:
//!
//! ```text
//! {"event":"open","conn":1,"protocol":"resp"}
//! {"event":"data","conn":1,"dir":"request","pos":0,"ts":0,"data":"*1\r\n$4\r\nPING\r\n"}
//! {"event":"close","conn":1}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use restitch::config::{parse_protocol, Config};
use restitch::{run_pipeline, CaptureEvent, MessageType, Protocol};

/// One line of the dump file.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum DumpEvent {
    Open {
        conn: u64,
        #[serde(default)]
        protocol: Option<String>,
    },
    Data {
        conn: u64,
        dir: DumpDirection,
        pos: u64,
        ts: u64,
        data: String,
    },
    Close {
        conn: u64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DumpDirection {
    Request,
    Response,
}

impl From<DumpDirection> for MessageType {
    fn from(dir: DumpDirection) -> Self {
        match dir {
            DumpDirection::Request => MessageType::Request,
            DumpDirection::Response => MessageType::Response,
        }
    }
}

fn to_capture_event(event: DumpEvent, default_protocol: Protocol) -> CaptureEvent {
    match event {
        DumpEvent::Open { conn, protocol } => CaptureEvent::Opened {
            conn,
            protocol: protocol
                .as_deref()
                .and_then(|name| parse_protocol(name).ok())
                .unwrap_or(default_protocol),
        },
        DumpEvent::Data {
            conn,
            dir,
            pos,
            ts,
            data,
        } => CaptureEvent::Data {
            conn,
            direction: dir.into(),
            pos,
            data: Bytes::from(data.into_bytes()),
            timestamp_ns: ts,
        },
        DumpEvent::Close { conn } => CaptureEvent::Closed { conn },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        input = %config.input.display(),
        buffer_capacity = config.buffer_capacity,
        protocol = %config.protocol,
        "replaying capture dump"
    );

    let file = File::open(&config.input)?;
    let default_protocol = config.protocol;

    let (event_tx, event_rx) = mpsc::channel(1024);
    let (record_tx, mut record_rx) = mpsc::channel(1024);

    let pipeline = tokio::spawn(run_pipeline(
        default_protocol,
        config.buffer_capacity,
        event_rx,
        record_tx,
    ));

    // File reading is blocking work; keep it off the async runtime so
    // record printing can drain concurrently.
    let reader = tokio::task::spawn_blocking(move || {
        let mut lines = 0u64;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(lineno, error = %e, "failed to read dump line");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let event: DumpEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(lineno, error = %e, "skipping malformed dump line");
                    continue;
                }
            };
            if event_tx
                .blocking_send(to_capture_event(event, default_protocol))
                .is_err()
            {
                break;
            }
            lines += 1;
        }
        lines
    });

    let mut decoded = 0u64;
    while let Some(record) = record_rx.recv().await {
        let time: DateTime<Utc> =
            DateTime::from_timestamp_nanos(record.message.timestamp_ns as i64);
        let direction = match record.direction {
            MessageType::Request => "->",
            MessageType::Response => "<-",
        };
        let flag = if record.message.is_published_message {
            " [pub]"
        } else {
            ""
        };
        println!(
            "{} conn={} {} {}{} {}",
            time.format("%H:%M:%S%.6f"),
            record.conn,
            direction,
            record.message.command,
            flag,
            record.message.payload
        );
        decoded += 1;
    }

    let events = reader.await?;
    pipeline.await?;
    info!(events, decoded, "replay finished");

    Ok(())
}
