//! RESP (Redis Serialization Protocol) value grammar.
//!
//! RESP values are tagged by a single leading marker byte followed by a
//! CRLF-terminated header and, for bulk strings, a length-prefixed body.
//! Parsing is incremental: a truncated value reports `Incomplete` and
//! consumes nothing, so the caller can retry once more bytes arrive.

use bytes::Bytes;

/// A decoded RESP value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Simple string: +OK\r\n
    Simple(String),
    /// Error: -ERR message\r\n
    Error(String),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $5\r\nhello\r\n, or $-1\r\n (null)
    Bulk(Option<Bytes>),
    /// Array: *2\r\n... , or *-1\r\n (null)
    Array(Option<Vec<Value>>),
}

/// Token rendered for a null bulk string.
const NULL_BULK: &str = "<NULL>";
/// Token rendered for a null array.
const NULL_ARRAY: &str = "[NULL]";

impl Value {
    /// Render into payload text.
    ///
    /// Scalars render as their raw text; arrays render as compact JSON
    /// arrays of their elements' renderings, recursing through nested
    /// arrays.
    pub fn render(&self) -> String {
        match self {
            Value::Array(Some(_)) => self.to_json().to_string(),
            other => other.scalar_text(),
        }
    }

    /// JSON form used inside array renderings: scalars become JSON
    /// strings of their text, arrays recurse.
    fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Array(Some(elems)) => {
                serde_json::Value::Array(elems.iter().map(Value::to_json).collect())
            }
            other => serde_json::Value::String(other.scalar_text()),
        }
    }

    /// Text form of a non-nested value, null tokens included.
    fn scalar_text(&self) -> String {
        match self {
            Value::Simple(s) | Value::Error(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Bulk(Some(data)) => String::from_utf8_lossy(data).into_owned(),
            Value::Bulk(None) => NULL_BULK.to_string(),
            Value::Array(None) => NULL_ARRAY.to_string(),
            Value::Array(Some(_)) => self.to_json().to_string(),
        }
    }

    /// The value's text when it can serve as a command token.
    pub fn as_text(&self) -> Option<&[u8]> {
        match self {
            Value::Simple(s) | Value::Error(s) => Some(s.as_bytes()),
            Value::Bulk(Some(data)) => Some(data),
            _ => None,
        }
    }
}

/// Result of parsing one value from a buffer.
#[derive(Debug, PartialEq)]
pub enum ValueResult {
    /// Successfully parsed a value spanning the given byte count.
    Complete(Value, usize),
    /// The buffer holds a valid but truncated value.
    Incomplete,
    /// The buffer can never parse, no matter what bytes follow.
    Invalid,
}

/// Parse a RESP value from the front of the buffer.
pub fn parse(buffer: &[u8]) -> ValueResult {
    if buffer.is_empty() {
        return ValueResult::Incomplete;
    }

    match buffer[0] {
        b'+' => parse_simple_string(buffer),
        b'-' => parse_error(buffer),
        b':' => parse_integer(buffer),
        b'$' => parse_bulk_string(buffer),
        b'*' => parse_array(buffer),
        _ => ValueResult::Invalid,
    }
}

/// Find CRLF in buffer, return position of \r.
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    (0..buffer.len().saturating_sub(1)).find(|&i| buffer[i] == b'\r' && buffer[i + 1] == b'\n')
}

/// Parse a simple string: +OK\r\n
fn parse_simple_string(buffer: &[u8]) -> ValueResult {
    match find_crlf(buffer) {
        Some(end) => match std::str::from_utf8(&buffer[1..end]) {
            Ok(s) => ValueResult::Complete(Value::Simple(s.to_string()), end + 2),
            Err(_) => ValueResult::Invalid,
        },
        None => ValueResult::Incomplete,
    }
}

/// Parse an error: -ERR message\r\n
fn parse_error(buffer: &[u8]) -> ValueResult {
    match find_crlf(buffer) {
        Some(end) => match std::str::from_utf8(&buffer[1..end]) {
            Ok(s) => ValueResult::Complete(Value::Error(s.to_string()), end + 2),
            Err(_) => ValueResult::Invalid,
        },
        None => ValueResult::Incomplete,
    }
}

/// Parse an integer: :1000\r\n
fn parse_integer(buffer: &[u8]) -> ValueResult {
    match find_crlf(buffer) {
        Some(end) => {
            let s = match std::str::from_utf8(&buffer[1..end]) {
                Ok(s) => s,
                Err(_) => return ValueResult::Invalid,
            };
            match s.parse::<i64>() {
                Ok(n) => ValueResult::Complete(Value::Integer(n), end + 2),
                Err(_) => ValueResult::Invalid,
            }
        }
        None => ValueResult::Incomplete,
    }
}

/// Parse the decimal length header shared by bulk strings and arrays.
/// `-1` declares a null value; anything below that is invalid.
fn parse_length(buffer: &[u8], header_end: usize) -> Result<i64, ValueResult> {
    let s = std::str::from_utf8(&buffer[1..header_end]).map_err(|_| ValueResult::Invalid)?;
    let len: i64 = s.parse().map_err(|_| ValueResult::Invalid)?;
    if len < -1 {
        return Err(ValueResult::Invalid);
    }
    Ok(len)
}

/// Parse a bulk string: $5\r\nhello\r\n or $-1\r\n
fn parse_bulk_string(buffer: &[u8]) -> ValueResult {
    let header_end = match find_crlf(buffer) {
        Some(end) => end,
        None => return ValueResult::Incomplete,
    };
    let len = match parse_length(buffer, header_end) {
        Ok(len) => len,
        Err(invalid) => return invalid,
    };

    if len == -1 {
        return ValueResult::Complete(Value::Bulk(None), header_end + 2);
    }

    let len = len as usize;
    let body_start = header_end + 2;
    let body_end = body_start + len;
    let total = body_end + 2;

    if buffer.len() < total {
        return ValueResult::Incomplete;
    }
    if buffer[body_end] != b'\r' || buffer[body_end + 1] != b'\n' {
        return ValueResult::Invalid;
    }

    let data = Bytes::copy_from_slice(&buffer[body_start..body_end]);
    ValueResult::Complete(Value::Bulk(Some(data)), total)
}

/// Parse an array: *2\r\n... or *-1\r\n
///
/// Elements parse left to right; the whole array is incomplete or
/// invalid as soon as any element is, and nothing is consumed in either
/// case.
fn parse_array(buffer: &[u8]) -> ValueResult {
    let header_end = match find_crlf(buffer) {
        Some(end) => end,
        None => return ValueResult::Incomplete,
    };
    let count = match parse_length(buffer, header_end) {
        Ok(count) => count,
        Err(invalid) => return invalid,
    };

    if count == -1 {
        return ValueResult::Complete(Value::Array(None), header_end + 2);
    }

    let count = count as usize;
    let mut offset = header_end + 2;
    let mut elems = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        match parse(&buffer[offset..]) {
            ValueResult::Complete(value, consumed) => {
                elems.push(value);
                offset += consumed;
            }
            ValueResult::Incomplete => return ValueResult::Incomplete,
            ValueResult::Invalid => return ValueResult::Invalid,
        }
    }

    ValueResult::Complete(Value::Array(Some(elems)), offset)
}
