//! RESP (Redis Serialization Protocol) message parsing.
//!
//! Layers direction semantics over the value grammar in [`parser`]:
//! requests are matched against the command table to produce a canonical
//! command name and structured arguments, responses are rendered as-is
//! with publish notifications flagged.

pub mod commands;
pub mod parser;

use crate::message::{Message, MessageType, ParseResult};
use parser::{Value, ValueResult};
use serde_json::Value as Json;
use tracing::debug;

/// Parse one RESP message from the front of the buffer.
///
/// Follows the shared parser contract: pure function of the buffer,
/// nothing consumed unless `Complete`.
pub fn parse_message(msg_type: MessageType, buffer: &[u8]) -> ParseResult {
    let (value, consumed) = match parser::parse(buffer) {
        ValueResult::Complete(value, consumed) => (value, consumed),
        ValueResult::Incomplete => return ParseResult::NeedsMoreData,
        ValueResult::Invalid => return ParseResult::Invalid,
    };

    let mut msg = Message::default();
    match msg_type {
        MessageType::Request => fill_request(&value, &mut msg),
        MessageType::Response => fill_response(&value, &mut msg),
    }
    ParseResult::Complete(msg, consumed)
}

/// Response side: the rendered value is the payload. A 3-element array
/// whose first element reads `message` is a publish notification on a
/// subscribed channel.
fn fill_response(value: &Value, msg: &mut Message) {
    msg.payload = value.render();

    if let Value::Array(Some(elems)) = value {
        if elems.len() == 3 && elems[0].as_text() == Some(&b"message"[..]) {
            msg.is_published_message = true;
        }
    }
}

/// Request side: when the value is an array of textual elements, match
/// the leading tokens against the command table. Anything else renders
/// like a response with an empty command; grammar validity and command
/// recognition are independent.
fn fill_request(value: &Value, msg: &mut Message) {
    let tokens = match command_tokens(value) {
        Some(tokens) => tokens,
        None => {
            msg.payload = value.render();
            return;
        }
    };

    let matched = commands::lookup(&tokens[0], tokens.get(1).map(String::as_str));
    let matched = match matched {
        Some(matched) => matched,
        None => {
            debug!(command = %tokens[0], "unrecognized command");
            msg.payload = value.render();
            return;
        }
    };

    msg.command = matched.name.to_string();
    let args: Vec<&str> = tokens[matched.tokens_consumed..]
        .iter()
        .map(String::as_str)
        .collect();

    match commands::extract_args(matched.args, &args) {
        Some(json) => {
            // A command with no modeled arguments reports an empty list.
            msg.payload = if json.as_object().is_some_and(|obj| obj.is_empty()) {
                "[]".to_string()
            } else {
                json.to_string()
            };
        }
        None => {
            debug!(command = %matched.name, argc = args.len(), "arguments do not fit template");
            let raw: Vec<Json> = args.iter().map(|a| Json::String(a.to_string())).collect();
            msg.payload = Json::Array(raw).to_string();
        }
    }
}

/// The array's elements as text tokens, when every element is textual.
fn command_tokens(value: &Value) -> Option<Vec<String>> {
    let elems = match value {
        Value::Array(Some(elems)) if !elems.is_empty() => elems,
        _ => return None,
    };
    elems
        .iter()
        .map(|e| e.as_text().map(|t| String::from_utf8_lossy(t).into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(msg_type: MessageType, input: &[u8]) -> Message {
        match parse_message(msg_type, input) {
            ParseResult::Complete(msg, consumed) => {
                assert_eq!(consumed, input.len(), "consumed != input length");
                msg
            }
            other => panic!("expected Complete for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_string_both_directions() {
        for msg_type in [MessageType::Request, MessageType::Response] {
            let msg = parse_ok(msg_type, b"+OK\r\n");
            assert_eq!(msg.payload, "OK");
            assert_eq!(msg.command, "");
        }
    }

    #[test]
    fn test_error_message() {
        let msg = parse_ok(MessageType::Response, b"-Error message\r\n");
        assert_eq!(msg.payload, "Error message");
    }

    #[test]
    fn test_null_bulk_string() {
        let msg = parse_ok(MessageType::Response, b"$-1\r\n");
        assert_eq!(msg.payload, "<NULL>");
    }

    #[test]
    fn test_null_array() {
        let msg = parse_ok(MessageType::Response, b"*-1\r\n");
        assert_eq!(msg.payload, "[NULL]");
    }

    #[test]
    fn test_mixed_array_response() {
        let msg = parse_ok(
            MessageType::Response,
            b"*3\r\n+OK\r\n-Error message\r\n$11\r\nbulk string\r\n",
        );
        assert_eq!(msg.payload, r#"["OK","Error message","bulk string"]"#);
        assert_eq!(msg.command, "");
    }

    #[test]
    fn test_two_token_command() {
        let msg = parse_ok(MessageType::Request, b"*2\r\n+ACL\r\n+LOAD\r\n");
        assert_eq!(msg.command, "ACL LOAD");
        assert_eq!(msg.payload, "[]");
    }

    #[test]
    fn test_spaced_command_name() {
        let msg = parse_ok(
            MessageType::Request,
            b"*2\r\n$11\r\nacl getuser\r\n$4\r\nuser\r\n",
        );
        assert_eq!(msg.command, "ACL GETUSER");
        assert_eq!(msg.payload, r#"{"username":"user"}"#);
    }

    #[test]
    fn test_repeating_command_args() {
        let msg = parse_ok(
            MessageType::Request,
            b"*3\r\n$11\r\nacl deluser\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        );
        assert_eq!(msg.command, "ACL DELUSER");
        assert_eq!(msg.payload, r#"{"username":["foo","bar"]}"#);
    }

    #[test]
    fn test_append_command() {
        let msg = parse_ok(
            MessageType::Request,
            b"*3\r\n$6\r\nappend\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        );
        assert_eq!(msg.command, "APPEND");
        assert_eq!(msg.payload, r#"{"key":"foo","value":"bar"}"#);
    }

    #[test]
    fn test_brpoplpush_command() {
        let msg = parse_ok(
            MessageType::Request,
            b"*4\r\n$10\r\nbrpoplpush\r\n$3\r\nsrc\r\n$4\r\ndest\r\n:10\r\n",
        );
        assert_eq!(msg.command, "BRPOPLPUSH");
        assert_eq!(
            msg.payload,
            r#"{"source":"src","destination":"dest","timeout":"10"}"#
        );
    }

    #[test]
    fn test_lpush_command() {
        let msg = parse_ok(
            MessageType::Request,
            b"*4\r\n$5\r\nlpush\r\n$3\r\nfoo\r\n$4\r\nbar0\r\n$4\r\nbar1\r\n",
        );
        assert_eq!(msg.command, "LPUSH");
        assert_eq!(msg.payload, r#"{"key":"foo","element":["bar0","bar1"]}"#);
    }

    #[test]
    fn test_zpopmax_optional_arg() {
        let msg = parse_ok(
            MessageType::Request,
            b"*3\r\n$7\r\nzpopmax\r\n$3\r\nfoo\r\n:10\r\n",
        );
        assert_eq!(msg.command, "ZPOPMAX");
        assert_eq!(msg.payload, r#"{"key":"foo","count":"10"}"#);

        let msg = parse_ok(MessageType::Request, b"*2\r\n$7\r\nzpopmax\r\n$3\r\nfoo\r\n");
        assert_eq!(msg.command, "ZPOPMAX");
        assert_eq!(msg.payload, r#"{"key":"foo"}"#);
    }

    #[test]
    fn test_unrecognized_command_keeps_rendering() {
        let msg = parse_ok(
            MessageType::Request,
            b"*2\r\n$7\r\nnothere\r\n$3\r\nfoo\r\n",
        );
        assert_eq!(msg.command, "");
        assert_eq!(msg.payload, r#"["nothere","foo"]"#);
    }

    #[test]
    fn test_template_mismatch_renders_raw_args() {
        // GET takes exactly one key.
        let msg = parse_ok(
            MessageType::Request,
            b"*3\r\n$3\r\nget\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        );
        assert_eq!(msg.command, "GET");
        assert_eq!(msg.payload, r#"["foo","bar"]"#);
    }

    #[test]
    fn test_published_message_flag() {
        let msg = parse_ok(
            MessageType::Response,
            b"*3\r\n$7\r\nmessage\r\n$3\r\nfoo\r\n$4\r\ntest\r\n",
        );
        assert!(msg.is_published_message);
        assert_eq!(msg.payload, r#"["message","foo","test"]"#);
        assert_eq!(msg.command, "");
    }

    #[test]
    fn test_published_flag_requires_three_elements() {
        let msg = parse_ok(MessageType::Response, b"*2\r\n$7\r\nmessage\r\n$3\r\nfoo\r\n");
        assert!(!msg.is_published_message);
    }

    #[test]
    fn test_incomplete_input() {
        assert_eq!(
            parse_message(MessageType::Response, b"+OK\r"),
            ParseResult::NeedsMoreData
        );
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(
            parse_message(MessageType::Request, b"$-2\r\n"),
            ParseResult::Invalid
        );
    }

    #[test]
    fn test_chunking_invariance() {
        let inputs: &[&[u8]] = &[
            b"+OK\r\n",
            b"$11\r\nbulk string\r\n",
            b"*4\r\n$5\r\nlpush\r\n$3\r\nfoo\r\n$4\r\nbar0\r\n$4\r\nbar1\r\n",
            b"*3\r\n$7\r\nmessage\r\n$3\r\nfoo\r\n$4\r\ntest\r\n",
        ];

        for input in inputs {
            let whole = parse_ok(MessageType::Request, input);
            for cut in 0..input.len() {
                assert_eq!(
                    parse_message(MessageType::Request, &input[..cut]),
                    ParseResult::NeedsMoreData,
                    "prefix of {cut} bytes"
                );
            }
            let again = parse_ok(MessageType::Request, input);
            assert_eq!(whole, again);
        }
    }
}
