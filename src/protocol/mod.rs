//! Wire protocol spoken with `claude --input-format stream-json --output-format stream-json`.
//!
//! Both directions carry newline-delimited JSON objects discriminated by
//! `type`. The CLI's output interleaves two kinds of lines:
//!
//! - control traffic (`control_request` / `control_response`), handled by the
//!   session engine and never surfaced as events
//! - domain events (`system`, `assistant`, `user`, `stream_event`, `result`,
//!   `rate_limit_event`, and anything newer), delivered to the caller in order
//!
//! # Example
//!
//! ```
//! use libclaude_agent::protocol::{decode, Envelope};
//!
//! let line = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"Hello!"}]}}"#;
//! if let Some(Envelope::Event(event)) = decode(line).unwrap() {
//!     assert_eq!(event.as_assistant().unwrap().text(), "Hello!");
//! }
//! ```

mod codec;
mod control;
mod messages;
mod usage;

pub use codec::{decode, encode, DecodeError, Envelope, LineCodec, MAX_LINE_BYTES};
pub use control::{
    CanUseToolRequest, ControlResponse, HookCallbackRequest, InboundControlRequest,
    OutboundMessage, UserContent, SUBTYPE_ERROR, SUBTYPE_SUCCESS,
};
pub use messages::{
    AssistantMessage, ContentBlock, Event, Message, MessagePayload, MessageType, ResultMessage,
    StreamDelta, StreamEventMessage, StreamEventPayload, SystemMessage, UserMessage,
};
pub use usage::Usage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Event>();
        assert_send_sync::<Envelope>();
        assert_send_sync::<OutboundMessage>();
        assert_send_sync::<ControlResponse>();
        assert_send_sync::<Usage>();
    }

    #[test]
    fn outbound_lines_decode_as_control_traffic() {
        let line = encode(&OutboundMessage::control_response(ControlResponse::success(
            "req-9", None,
        )))
        .unwrap();
        let text = std::str::from_utf8(&line).unwrap();
        match decode(text).unwrap().unwrap() {
            Envelope::ControlResponse(resp) => assert_eq!(resp.request_id, "req-9"),
            other => panic!("unexpected envelope: {other:?}"),
        }
    }
}
