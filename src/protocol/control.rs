//! Control-plane wire types and the messages the host writes to the CLI.
//!
//! Control traffic flows both ways over the same pipes as domain events:
//!
//! - host → CLI: `control_request` (`initialize`, `set_model`, `interrupt`, ...)
//! - CLI → host: `control_request` (`can_use_tool`, `hook_callback`, ...)
//! - both ways: `control_response`, correlated by `request_id`

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ClientConfig;
use crate::control::PermissionUpdate;

/// `subtype` of a successful control response.
pub const SUBTYPE_SUCCESS: &str = "success";
/// `subtype` of a failed control response.
pub const SUBTYPE_ERROR: &str = "error";

/// The `response` object of a `control_response` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub subtype: String,
    #[serde(default)]
    pub request_id: String,
    /// Result payload of a successful request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Failure description when `subtype` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn success(request_id: impl Into<String>, response: Option<Value>) -> Self {
        Self {
            subtype: SUBTYPE_SUCCESS.into(),
            request_id: request_id.into(),
            response,
            error: None,
        }
    }

    pub fn error(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            subtype: SUBTYPE_ERROR.into(),
            request_id: request_id.into(),
            response: None,
            error: Some(error.into()),
        }
    }

    /// Anything other than an explicit `error` subtype counts as success.
    pub fn is_success(&self) -> bool {
        self.subtype != SUBTYPE_ERROR
    }

    /// Failure description, falling back to a generic message.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("control request failed")
    }
}

/// A `control_request` sent by the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundControlRequest {
    /// Empty when the CLI omitted it.
    pub request_id: String,
    pub subtype: String,
    /// The full `request` object, `subtype` included.
    pub request: Value,
}

impl InboundControlRequest {
    /// Interpret the payload as a `can_use_tool` request.
    pub fn as_can_use_tool(&self) -> Option<CanUseToolRequest> {
        serde_json::from_value(self.request.clone()).ok()
    }

    /// Interpret the payload as a `hook_callback` request.
    pub fn as_hook_callback(&self) -> Option<HookCallbackRequest> {
        serde_json::from_value(self.request.clone()).ok()
    }
}

/// Payload of a `can_use_tool` control request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanUseToolRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub tool_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tool_use_id: String,
    pub input: Value,
    pub permission_suggestions: Option<Vec<Value>>,
    pub blocked_path: Option<String>,
    pub decision_reason: Option<String>,
    pub agent_id: Option<String>,
}

impl CanUseToolRequest {
    /// Suggested permission updates; entries of unknown shape are skipped.
    pub fn suggestions(&self) -> Vec<PermissionUpdate> {
        self.permission_suggestions
            .iter()
            .flatten()
            .filter_map(|s| serde_json::from_value(s.clone()).ok())
            .collect()
    }
}

/// Payload of a `hook_callback` control request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HookCallbackRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub callback_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hook_event: String,
    pub input: Value,
    /// `null` for events not tied to a tool call.
    #[serde(deserialize_with = "null_as_default")]
    pub tool_use_id: String,
}

/// Read `null` as the type's default, like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The `message` object of a user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserContent {
    pub role: &'static str,
    pub content: String,
}

/// Every line the host writes to the CLI's stdin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ControlRequest {
        request_id: String,
        request: Value,
    },
    ControlResponse {
        response: ControlResponse,
    },
    User {
        message: UserContent,
        parent_tool_use_id: Option<String>,
        session_id: String,
    },
}

impl OutboundMessage {
    /// A host-initiated control request `{subtype, ...fields}`.
    pub fn control_request(
        request_id: impl Into<String>,
        subtype: &str,
        fields: Map<String, Value>,
    ) -> Self {
        let mut request = Map::with_capacity(fields.len() + 1);
        request.insert("subtype".into(), json!(subtype));
        request.extend(fields);
        Self::ControlRequest {
            request_id: request_id.into(),
            request: Value::Object(request),
        }
    }

    pub fn control_response(response: ControlResponse) -> Self {
        Self::ControlResponse { response }
    }

    /// A user prompt.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self::User {
            message: UserContent {
                role: "user",
                content: prompt.into(),
            },
            parent_tool_use_id: None,
            session_id: String::new(),
        }
    }

    /// The `initialize` request written before anything else.
    ///
    /// Carries what the CLI accepts only over stdin: system prompts, MCP
    /// servers, agents, hook ids, structured output and sandbox settings.
    pub fn initialize(request_id: impl Into<String>, config: &ClientConfig, hooks: Value) -> Self {
        let mut request = Map::new();
        request.insert("subtype".into(), json!("initialize"));
        if let Some(prompt) = &config.system_prompt {
            request.insert("systemPrompt".into(), json!(prompt));
        }
        if let Some(prompt) = &config.append_system_prompt {
            request.insert("appendSystemPrompt".into(), json!(prompt));
        }
        request.insert("sdkMcpServers".into(), json!(config.mcp_servers));
        request.insert("hooks".into(), hooks);
        request.insert("agents".into(), json!(config.agents));
        request.insert("promptSuggestions".into(), json!(false));
        if let Some(format) = &config.output_format {
            request.insert("outputFormat".into(), json!(format.kind));
            if let Some(schema) = &format.schema {
                request.insert("jsonSchema".into(), schema.clone());
            }
        }
        if let Some(sandbox) = &config.sandbox {
            request.insert("sandbox".into(), json!(sandbox));
        }

        Self::ControlRequest {
            request_id: request_id.into(),
            request: Value::Object(request),
        }
    }
}
