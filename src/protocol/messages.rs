//! Domain event types: everything the CLI emits that is not control traffic.
//!
//! These are best-effort projections. The dispatcher never fails a line because
//! its payload does not match these shapes; it forwards the raw JSON instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::usage::Usage;

/// The `type` discriminant carried by every line from the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A complete assistant turn.
    Assistant,
    /// A user message echoed back (typically tool results).
    User,
    /// Incremental streaming deltas (`--include-partial-messages`).
    StreamEvent,
    /// The final message of a turn.
    Result,
    /// Status / init / synthesized error messages.
    System,
    /// Rate-limit information.
    RateLimitEvent,
    /// Control request (never surfaced as an event).
    ControlRequest,
    /// Control response (never surfaced as an event).
    ControlResponse,
    /// Any discriminant this crate does not know about.
    Other(String),
}

impl MessageType {
    /// Wire name of this discriminant.
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Assistant => "assistant",
            MessageType::User => "user",
            MessageType::StreamEvent => "stream_event",
            MessageType::Result => "result",
            MessageType::System => "system",
            MessageType::RateLimitEvent => "rate_limit_event",
            MessageType::ControlRequest => "control_request",
            MessageType::ControlResponse => "control_response",
            MessageType::Other(s) => s,
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "assistant" => MessageType::Assistant,
            "user" => MessageType::User,
            "stream_event" => MessageType::StreamEvent,
            "result" => MessageType::Result,
            "system" => MessageType::System,
            "rate_limit_event" => MessageType::RateLimitEvent,
            "control_request" => MessageType::ControlRequest,
            "control_response" => MessageType::ControlResponse,
            other => MessageType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed projection of a domain event.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Assistant(AssistantMessage),
    User(UserMessage),
    StreamEvent(StreamEventMessage),
    Result(ResultMessage),
    System(SystemMessage),
}

/// One domain event, in the order the CLI emitted it.
///
/// `kind` is always set and `raw` always holds the original line. `message` is
/// `None` for unknown kinds or when the payload did not match the typed shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Envelope discriminant.
    pub kind: MessageType,
    /// Best-effort typed payload.
    pub message: Option<Message>,
    /// The raw JSON line.
    pub raw: String,
}

impl Event {
    /// Build a synthetic `system`/`error` event for process-level failures.
    pub fn process_error(message: impl Into<String>) -> Self {
        let system = SystemMessage {
            subtype: SystemMessage::SUBTYPE_ERROR.to_string(),
            message: Some(message.into()),
            ..Default::default()
        };
        let raw = serde_json::json!({
            "type": "system",
            "subtype": system.subtype,
            "message": system.message,
        })
        .to_string();
        Self {
            kind: MessageType::System,
            message: Some(Message::System(system)),
            raw,
        }
    }

    /// Whether this is the terminal event of a turn.
    pub fn is_result(&self) -> bool {
        self.kind == MessageType::Result
    }

    /// Whether this is a synthesized process-level error.
    pub fn is_process_error(&self) -> bool {
        self.as_system().is_some_and(SystemMessage::is_error)
    }

    /// Get as assistant message.
    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match &self.message {
            Some(Message::Assistant(m)) => Some(m),
            _ => None,
        }
    }

    /// Get as stream event message.
    pub fn as_stream_event(&self) -> Option<&StreamEventMessage> {
        match &self.message {
            Some(Message::StreamEvent(m)) => Some(m),
            _ => None,
        }
    }

    /// Get as result message.
    pub fn as_result(&self) -> Option<&ResultMessage> {
        match &self.message {
            Some(Message::Result(m)) => Some(m),
            _ => None,
        }
    }

    /// Get as system message.
    pub fn as_system(&self) -> Option<&SystemMessage> {
        match &self.message {
            Some(Message::System(m)) => Some(m),
            _ => None,
        }
    }

    /// Parse the raw line as an untyped JSON value.
    pub fn raw_value(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.raw)
    }
}

/// One element of a message's `content` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
    /// Extended thinking.
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Tool invocation requested by the model.
    ToolUse { id: String, name: String, input: Value },
    /// Tool output returned to the model.
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Block types this crate does not model.
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    /// Text content, if this is a text block.
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// The inner `message` object of assistant and user messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub role: String,
    #[serde(default, deserialize_with = "content_blocks")]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// User content may be a bare string; normalize it to a single text block.
fn content_blocks<'de, D>(deserializer: D) -> std::result::Result<Vec<ContentBlock>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Content {
        Text(String),
        Blocks(Vec<ContentBlock>),
    }

    Ok(match Content::deserialize(deserializer)? {
        Content::Text(text) => vec![ContentBlock::Text { text }],
        Content::Blocks(blocks) => blocks,
    })
}

/// A complete assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub message: MessagePayload,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl AssistantMessage {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(ContentBlock::text)
            .collect()
    }

    /// Concatenated thinking of all thinking blocks.
    pub fn thinking(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Thinking { thinking, .. } => Some(thinking.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool invocations in this turn as `(id, name, input)`.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.message
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// A user message echoed by the CLI (tool results, replayed prompts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub message: MessagePayload,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Incremental delta inside a stream event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_json: Option<String>,
}

/// The inner `event` object of a stream event message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEventPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub delta: Option<StreamDelta>,
}

/// Partial assistant output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEventMessage {
    pub event: StreamEventPayload,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl StreamEventMessage {
    /// Text fragment carried by a `text_delta`.
    pub fn text_delta(&self) -> Option<&str> {
        self.event.delta.as_ref().and_then(|d| d.text.as_deref())
    }
}

/// The terminal message of a turn, for both success and error outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultMessage {
    pub subtype: String,
    pub is_error: bool,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub num_turns: u32,
    pub result: Option<String>,
    pub stop_reason: Option<String>,
    pub total_cost_usd: f64,
    pub usage: Usage,
    pub session_id: String,
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permission_denials: Vec<Value>,
}

impl ResultMessage {
    /// Check if this is an error result.
    pub fn is_error(&self) -> bool {
        self.is_error || self.subtype.starts_with("error")
    }

    /// Human-readable error description.
    pub fn error_message(&self) -> String {
        if !self.errors.is_empty() {
            self.errors.join("; ")
        } else if let Some(result) = self.result.as_deref().filter(|r| !r.is_empty()) {
            result.to_string()
        } else {
            self.subtype.clone()
        }
    }

    /// Run duration.
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.duration_ms)
    }
}

/// `system` messages: `init` at session start, `status` updates, and
/// synthesized `error` events for process failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemMessage {
    pub subtype: String,
    pub status: Option<String>,
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub model: Option<String>,
    pub tools: Vec<String>,
    #[serde(rename = "permissionMode")]
    pub permission_mode: Option<String>,
    pub claude_code_version: Option<String>,
    #[serde(rename = "apiKeySource")]
    pub api_key_source: Option<String>,
    pub agents: Vec<String>,
    pub betas: Vec<String>,
    pub skills: Vec<String>,
    pub plugins: Vec<Value>,
    pub slash_commands: Vec<String>,
}

impl SystemMessage {
    /// Session start subtype.
    pub const SUBTYPE_INIT: &'static str = "init";
    /// Status update subtype.
    pub const SUBTYPE_STATUS: &'static str = "status";
    /// Process failure subtype (synthesized by this crate).
    pub const SUBTYPE_ERROR: &'static str = "error";

    /// Check if this is an init message.
    pub fn is_init(&self) -> bool {
        self.subtype == Self::SUBTYPE_INIT
    }

    /// Check if this is an error message.
    pub fn is_error(&self) -> bool {
        self.subtype == Self::SUBTYPE_ERROR
    }
}
