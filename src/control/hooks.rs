//! Lifecycle hook callbacks.
//!
//! Hooks are declared up front as [`HookMatcher`]s per [`HookEvent`]. At start
//! each callback gets a generated id; the ids are announced to the CLI in the
//! initialize request and the CLI later invokes them with `hook_callback`
//! control requests.

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Boxed error returned by hook callbacks.
pub type HookError = Box<dyn StdError + Send + Sync>;

/// Lifecycle event that triggers a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    PostToolUseFailure,
    Notification,
    Stop,
    SubagentStop,
    SubagentStart,
    PreCompact,
    UserPromptSubmit,
    Start,
    PreBash,
    PostBash,
    PreEdit,
    PostEdit,
    Setup,
    PermissionRequest,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::PostToolUseFailure => "PostToolUseFailure",
            HookEvent::Notification => "Notification",
            HookEvent::Stop => "Stop",
            HookEvent::SubagentStop => "SubagentStop",
            HookEvent::SubagentStart => "SubagentStart",
            HookEvent::PreCompact => "PreCompact",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::Start => "Start",
            HookEvent::PreBash => "PreBash",
            HookEvent::PostBash => "PostBash",
            HookEvent::PreEdit => "PreEdit",
            HookEvent::PostEdit => "PostEdit",
            HookEvent::Setup => "Setup",
            HookEvent::PermissionRequest => "PermissionRequest",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value returned by a hook. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Whether the operation continues.
    #[serde(default, rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suppress_output: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// `approve`, `reject` or `ask`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    /// Extra message injected into the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<Value>,
}

/// A hook invocation as received from the CLI.
#[derive(Debug, Clone, Copy)]
pub struct HookInput<'a> {
    /// Event name as sent by the CLI (may be newer than [`HookEvent`]).
    pub event: &'a str,
    pub input: &'a Value,
    /// Empty for events not tied to a tool call.
    pub tool_use_id: &'a str,
}

/// A hook callback. Closures with the matching signature implement this trait.
pub trait HookCallback: Send + Sync {
    fn invoke(&self, hook: HookInput<'_>) -> Result<Option<HookOutput>, HookError>;
}

impl<F> HookCallback for F
where
    F: Fn(HookInput<'_>) -> Result<Option<HookOutput>, HookError> + Send + Sync,
{
    fn invoke(&self, hook: HookInput<'_>) -> Result<Option<HookOutput>, HookError> {
        self(hook)
    }
}

impl fmt::Debug for dyn HookCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookCallback")
    }
}

/// Callbacks registered for tool names matching a pattern.
#[derive(Debug, Clone, Default)]
pub struct HookMatcher {
    /// Glob-style tool name pattern; `None` matches everything.
    pub matcher: Option<String>,
    pub callbacks: Vec<Arc<dyn HookCallback>>,
    /// Per-invocation timeout in milliseconds, enforced by the CLI.
    pub timeout_ms: Option<u64>,
}

impl HookMatcher {
    /// Match every tool.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match tool names against `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            matcher: Some(pattern.into()),
            ..Default::default()
        }
    }

    /// Add a closure callback. Types implementing [`HookCallback`] can be
    /// pushed onto `callbacks` directly.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(HookInput<'_>) -> Result<Option<HookOutput>, HookError> + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Immutable map from generated callback id to callback, built at start.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    callbacks: HashMap<String, Arc<dyn HookCallback>>,
}

impl HookRegistry {
    /// Assign an id to every callback.
    ///
    /// Returns the registry and the `hooks` object of the initialize request:
    /// `{event: [{callback_id, matcher?, timeout?}, ...]}`.
    pub fn build(hooks: &BTreeMap<HookEvent, Vec<HookMatcher>>) -> (Self, Value) {
        let mut callbacks = HashMap::new();
        let mut config = Map::new();

        for (event, matchers) in hooks {
            let mut entries = Vec::new();
            for matcher in matchers {
                for callback in &matcher.callbacks {
                    let id = uuid::Uuid::new_v4().to_string();
                    let mut entry = Map::new();
                    entry.insert("callback_id".into(), json!(id));
                    if let Some(pattern) = matcher.matcher.as_deref().filter(|p| !p.is_empty()) {
                        entry.insert("matcher".into(), json!(pattern));
                    }
                    if let Some(timeout) = matcher.timeout_ms.filter(|t| *t > 0) {
                        entry.insert("timeout".into(), json!(timeout));
                    }
                    entries.push(Value::Object(entry));
                    callbacks.insert(id, Arc::clone(callback));
                }
            }
            if !entries.is_empty() {
                config.insert(event.as_str().to_string(), Value::Array(entries));
            }
        }

        (Self { callbacks }, Value::Object(config))
    }

    pub fn get(&self, callback_id: &str) -> Option<&Arc<dyn HookCallback>> {
        self.callbacks.get(callback_id)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: HookInput<'_>) -> Result<Option<HookOutput>, HookError> {
        Ok(None)
    }

    #[test]
    fn empty_hooks_produce_empty_config() {
        let (registry, config) = HookRegistry::build(&BTreeMap::new());
        assert!(registry.is_empty());
        assert_eq!(config, json!({}));
    }

    #[test]
    fn every_callback_gets_a_distinct_id() {
        let mut hooks = BTreeMap::new();
        hooks.insert(
            HookEvent::PreToolUse,
            vec![
                HookMatcher::new("Bash").callback(noop).callback(noop).timeout_ms(500),
                HookMatcher::all().callback(noop),
            ],
        );
        hooks.insert(HookEvent::Stop, vec![HookMatcher::all()]);

        let (registry, config) = HookRegistry::build(&hooks);
        assert_eq!(registry.len(), 3);

        let entries = config["PreToolUse"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["matcher"], "Bash");
        assert_eq!(entries[0]["timeout"], 500);
        assert!(entries[2].get("matcher").is_none());

        let ids: std::collections::HashSet<_> = entries
            .iter()
            .map(|e| e["callback_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 3);
        for id in &ids {
            assert!(registry.get(id).is_some());
            assert!(uuid::Uuid::parse_str(id).is_ok());
        }

        // Matchers without callbacks are not announced.
        assert!(config.get("Stop").is_none());
    }

    #[test]
    fn callback_accepts_unannotated_closures() {
        let matcher = HookMatcher::all()
            .callback(|_| Ok(None))
            .callback(|hook| {
                if hook.event == "Stop" {
                    Err("not now".into())
                } else {
                    Ok(None)
                }
            });
        assert_eq!(matcher.callbacks.len(), 2);

        let input = json!({});
        let stop = HookInput {
            event: "Stop",
            input: &input,
            tool_use_id: "",
        };
        assert!(matcher.callbacks[0].invoke(stop).unwrap().is_none());
        assert!(matcher.callbacks[1].invoke(stop).is_err());
    }

    #[test]
    fn hook_output_wire_names() {
        let output = HookOutput {
            continue_: Some(false),
            stop_reason: Some("policy".into()),
            system_message: Some("careful".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"continue": false, "stopReason": "policy", "systemMessage": "careful"})
        );
    }

    #[test]
    fn closure_callbacks_receive_input() {
        let callback = |hook: HookInput<'_>| -> Result<Option<HookOutput>, HookError> {
            if hook.tool_use_id.is_empty() {
                return Err("missing tool use id".into());
            }
            Ok(Some(HookOutput {
                reason: Some(format!("{}:{}", hook.event, hook.input["command"])),
                ..Default::default()
            }))
        };
        let input = json!({"command": "ls"});
        let out = callback
            .invoke(HookInput {
                event: "PreToolUse",
                input: &input,
                tool_use_id: "toolu_1",
            })
            .unwrap()
            .unwrap();
        assert_eq!(out.reason.as_deref(), Some("PreToolUse:\"ls\""));

        let err = callback
            .invoke(HookInput {
                event: "Stop",
                input: &input,
                tool_use_id: "",
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "missing tool use id");
    }
}
