//! Newline-delimited JSON framing for the CLI's stdio.
//!
//! Every line is one JSON object. Outbound values are encoded compactly so the
//! payload itself never contains a newline. Inbound lines are classified by
//! their `type` field into control traffic and domain events.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use super::control::{ControlResponse, InboundControlRequest};
use super::messages::{Event, Message, MessageType};
use crate::{Error, Result};

/// Longest line accepted from the CLI (4 MiB).
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Serialize `value` as one line: compact JSON followed by `\n`.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(line)
}

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// The CLI asks the host something; must be answered exactly once.
    ControlRequest(InboundControlRequest),
    /// The CLI answers a host request.
    ControlResponse(ControlResponse),
    /// Anything else, delivered to the caller in order.
    Event(Event),
}

/// Why an inbound line could not be classified. The line is skipped.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("line is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("line is not a JSON object")]
    NotAnObject,
}

/// Just enough of a line to route it.
#[derive(Deserialize)]
struct Peek {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    request: Option<Value>,
    #[serde(default)]
    response: Option<Value>,
}

/// Classify one line. Blank lines yield `Ok(None)`.
pub fn decode(line: &str) -> std::result::Result<Option<Envelope>, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('{') {
        return Err(DecodeError::NotAnObject);
    }
    let peek: Peek = serde_json::from_str(line).map_err(DecodeError::InvalidJson)?;
    let kind = MessageType::from(peek.kind.as_deref().unwrap_or_default());

    let envelope = match kind {
        MessageType::ControlRequest => {
            let request = peek.request.unwrap_or(Value::Null);
            let subtype = request
                .get("subtype")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Envelope::ControlRequest(InboundControlRequest {
                request_id: peek.request_id.unwrap_or_default(),
                subtype,
                request,
            })
        }
        MessageType::ControlResponse => {
            let body = peek.response.unwrap_or(Value::Null);
            let mut response: ControlResponse = serde_json::from_value(body)
                .unwrap_or_else(|_| ControlResponse::error("", "malformed control response"));
            if response.request_id.is_empty() {
                response.request_id = peek.request_id.unwrap_or_default();
            }
            Envelope::ControlResponse(response)
        }
        kind => Envelope::Event(project(kind, line)),
    };
    Ok(Some(envelope))
}

/// Build an event, attaching a typed payload when the line matches one.
fn project(kind: MessageType, line: &str) -> Event {
    let message = match kind {
        MessageType::Assistant => serde_json::from_str(line).ok().map(Message::Assistant),
        MessageType::User => serde_json::from_str(line).ok().map(Message::User),
        MessageType::StreamEvent => serde_json::from_str(line).ok().map(Message::StreamEvent),
        MessageType::Result => serde_json::from_str(line).ok().map(Message::Result),
        MessageType::System => serde_json::from_str(line).ok().map(Message::System),
        _ => None,
    };
    Event {
        kind,
        message,
        raw: line.to_string(),
    }
}

/// Line framing for the CLI's stdout.
///
/// Wraps [`LinesCodec`] with a [`MAX_LINE_BYTES`] limit. An over-long line is
/// discarded and reading resumes at the next newline; only I/O errors end the
/// stream.
#[derive(Debug)]
pub struct LineCodec {
    inner: LinesCodec,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            match self.inner.decode(src) {
                Ok(line) => return Ok(line),
                Err(e) => skip_or_fail(e)?,
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            match self.inner.decode_eof(src) {
                Ok(line) => return Ok(line),
                Err(e) => skip_or_fail(e)?,
            }
        }
    }
}

/// Line-level failures are skipped; the offending line is already consumed.
fn skip_or_fail(err: LinesCodecError) -> Result<()> {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            tracing::warn!("discarding over-long line from claude");
            Ok(())
        }
        LinesCodecError::Io(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            tracing::warn!(error = %e, "discarding non-UTF-8 line from claude");
            Ok(())
        }
        LinesCodecError::Io(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use tokio_util::codec::FramedRead;

    #[test]
    fn encode_is_one_line() {
        let line = encode(&json!({"text": "a\nb", "n": 1})).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert!(decode("").unwrap().is_none());
        assert!(decode("   \r").unwrap().is_none());
    }

    #[test]
    fn non_json_and_non_objects_are_rejected() {
        assert!(matches!(
            decode("Loading configuration..."),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(decode("[1, 2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(
            decode("{\"type\": "),
            Err(DecodeError::InvalidJson(_))
        ));
    }

    #[test]
    fn control_request_is_classified() {
        let line = r#"{"type":"control_request","request_id":"cli-7","request":{"subtype":"can_use_tool","tool_name":"Bash"}}"#;
        match decode(line).unwrap().unwrap() {
            Envelope::ControlRequest(req) => {
                assert_eq!(req.request_id, "cli-7");
                assert_eq!(req.subtype, "can_use_tool");
                assert_eq!(req.request["tool_name"], "Bash");
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn control_response_id_inner_then_outer() {
        let inner = r#"{"type":"control_response","response":{"subtype":"success","request_id":"req-1"}}"#;
        let outer = r#"{"type":"control_response","request_id":"req-2","response":{"subtype":"error","error":"nope"}}"#;

        match decode(inner).unwrap().unwrap() {
            Envelope::ControlResponse(resp) => {
                assert_eq!(resp.request_id, "req-1");
                assert!(resp.is_success());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
        match decode(outer).unwrap().unwrap() {
            Envelope::ControlResponse(resp) => {
                assert_eq!(resp.request_id, "req-2");
                assert!(!resp.is_success());
                assert_eq!(resp.error.as_deref(), Some("nope"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn domain_events_keep_raw_line() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"4","session_id":"s"}"#;
        match decode(line).unwrap().unwrap() {
            Envelope::Event(event) => {
                assert!(event.is_result());
                assert_eq!(event.raw, line);
                assert_eq!(event.as_result().unwrap().result.as_deref(), Some("4"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_an_untyped_event() {
        let line = r#"{"type":"tool_progress","elapsed":3}"#;
        match decode(line).unwrap().unwrap() {
            Envelope::Event(event) => {
                assert_eq!(event.kind, MessageType::Other("tool_progress".into()));
                assert!(event.message.is_none());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn mismatched_payload_keeps_kind() {
        // Valid envelope, but "message" is not an object.
        let line = r#"{"type":"assistant","message":42}"#;
        match decode(line).unwrap().unwrap() {
            Envelope::Event(event) => {
                assert_eq!(event.kind, MessageType::Assistant);
                assert!(event.message.is_none());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[tokio::test]
    async fn framing_skips_over_long_lines() {
        let input = format!("{{\"a\":1}}\n{}\n{{\"b\":2}}\n", "x".repeat(64));
        let mut lines = FramedRead::new(input.as_bytes(), LineCodec::with_max_length(32));

        assert_eq!(lines.next().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next().await.unwrap().unwrap(), "{\"b\":2}");
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn framing_skips_invalid_utf8() {
        let mut lines = FramedRead::new(&b"\xff\xfe\n{\"b\":2}\n"[..], LineCodec::new());
        assert_eq!(lines.next().await.unwrap().unwrap(), "{\"b\":2}");
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn framing_yields_unterminated_last_line() {
        let mut lines = FramedRead::new(&b"{\"a\":1}\n{\"b\":2}"[..], LineCodec::new());
        assert_eq!(lines.next().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next().await.unwrap().unwrap(), "{\"b\":2}");
        assert!(lines.next().await.is_none());
    }
}
