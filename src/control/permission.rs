//! Tool permission decisions for `can_use_tool` requests.
//!
//! When the CLI wants to run a tool and the permission mode requires a
//! decision, it sends a `can_use_tool` control request. The configured
//! [`PermissionHandler`] answers it; without one every call is allowed.
//!
//! # Example
//!
//! ```ignore
//! use libclaude_agent::control::{PermissionContext, PermissionResult};
//!
//! let config = ClientConfig::builder()
//!     .permission_mode(PermissionMode::Default)
//!     .permission_handler(|tool: &str, _input: &serde_json::Value, _ctx: &PermissionContext| {
//!         if tool == "Bash" {
//!             PermissionResult::deny("shell access is disabled")
//!         } else {
//!             PermissionResult::allow()
//!         }
//!     })
//!     .build()?;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::PermissionMode;

/// Outcome of a permission rule or decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionBehavior {
    #[default]
    Allow,
    Deny,
    Ask,
}

/// Where a permission update is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionUpdateDestination {
    UserSettings,
    ProjectSettings,
    LocalSettings,
    Session,
}

/// A tool name with an optional content pattern (`git commit:*`, `/src/**`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRuleValue {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_content: Option<String>,
}

/// A permission mutation suggested by the CLI or returned by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PermissionUpdate {
    AddRules {
        rules: Vec<PermissionRuleValue>,
        behavior: PermissionBehavior,
        destination: PermissionUpdateDestination,
    },
    ReplaceRules {
        rules: Vec<PermissionRuleValue>,
        behavior: PermissionBehavior,
        destination: PermissionUpdateDestination,
    },
    RemoveRules {
        rules: Vec<PermissionRuleValue>,
        behavior: PermissionBehavior,
        destination: PermissionUpdateDestination,
    },
    SetMode {
        mode: PermissionMode,
        destination: PermissionUpdateDestination,
    },
    AddDirectories {
        directories: Vec<String>,
        destination: PermissionUpdateDestination,
    },
    RemoveDirectories {
        directories: Vec<String>,
        destination: PermissionUpdateDestination,
    },
}

/// Context accompanying a `can_use_tool` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionContext {
    /// Updates the CLI suggests applying if the call is allowed.
    pub suggestions: Vec<PermissionUpdate>,
    /// Set when a path restriction triggered the request.
    pub blocked_path: Option<String>,
    pub decision_reason: Option<String>,
    pub tool_use_id: String,
    /// Set when the request originates from a sub-agent.
    pub agent_id: Option<String>,
}

/// Decision returned by a [`PermissionHandler`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionResult {
    /// `Deny` refuses the call; anything else allows it.
    pub behavior: PermissionBehavior,
    /// Replacement tool input (allow only).
    pub updated_input: Option<Value>,
    /// Permission mutations to apply (allow only).
    pub updated_permissions: Vec<PermissionUpdate>,
    /// Explanation shown to the model (deny only).
    pub message: Option<String>,
    /// Stop the agent after this call (deny only).
    pub interrupt: bool,
}

impl PermissionResult {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            behavior: PermissionBehavior::Deny,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Deny and stop the agent.
    pub fn deny_and_interrupt(message: impl Into<String>) -> Self {
        Self {
            interrupt: true,
            ..Self::deny(message)
        }
    }

    /// Allow with a rewritten tool input.
    pub fn allow_with_input(input: Value) -> Self {
        Self {
            updated_input: Some(input),
            ..Default::default()
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.behavior != PermissionBehavior::Deny
    }

    /// Body of the success control response for the tool call `tool_use_id`.
    pub(crate) fn to_response(&self, tool_use_id: &str) -> Value {
        let mut body = Map::new();
        body.insert("allowed".into(), json!(self.is_allowed()));
        body.insert("toolUseID".into(), json!(tool_use_id));
        if let Some(input) = &self.updated_input {
            body.insert("updatedInput".into(), input.clone());
        }
        if !self.updated_permissions.is_empty() {
            body.insert("updatedPermissions".into(), json!(self.updated_permissions));
        }
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            body.insert("message".into(), json!(message));
        }
        if self.interrupt {
            body.insert("interrupt".into(), json!(true));
        }
        Value::Object(body)
    }
}

/// Decides whether the agent may run a tool.
///
/// Called from the inbound dispatcher; long-running work here delays every
/// later line from the CLI. Closures with the matching signature implement
/// this trait.
pub trait PermissionHandler: Send + Sync {
    fn can_use_tool(&self, tool_name: &str, input: &Value, ctx: &PermissionContext)
        -> PermissionResult;
}

impl<F> PermissionHandler for F
where
    F: Fn(&str, &Value, &PermissionContext) -> PermissionResult + Send + Sync,
{
    fn can_use_tool(
        &self,
        tool_name: &str,
        input: &Value,
        ctx: &PermissionContext,
    ) -> PermissionResult {
        self(tool_name, input, ctx)
    }
}

impl fmt::Debug for dyn PermissionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PermissionHandler")
    }
}
