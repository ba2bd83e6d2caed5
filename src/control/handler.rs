//! Answers for control requests initiated by the CLI.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use super::hooks::{HookInput, HookRegistry};
use super::permission::{PermissionContext, PermissionHandler, PermissionResult};
use crate::protocol::{ControlResponse, InboundControlRequest};

/// Services `can_use_tool`, `hook_callback` and every other inbound subtype.
///
/// Produces exactly one response per request. Callback errors and panics
/// become error responses; nothing here fails the session.
#[derive(Debug, Clone, Default)]
pub struct ControlHandler {
    permission: Option<Arc<dyn PermissionHandler>>,
    hooks: HookRegistry,
}

impl ControlHandler {
    pub fn new(permission: Option<Arc<dyn PermissionHandler>>, hooks: HookRegistry) -> Self {
        Self { permission, hooks }
    }

    pub fn handle(&self, request: &InboundControlRequest) -> ControlResponse {
        debug!(
            request_id = %request.request_id,
            subtype = %request.subtype,
            "control request from claude"
        );
        match request.subtype.as_str() {
            "can_use_tool" => self.can_use_tool(request),
            "hook_callback" => self.hook_callback(request),
            // Notifications such as set_model or mcp_message only need an ack.
            _ => ControlResponse::success(&request.request_id, None),
        }
    }

    fn can_use_tool(&self, request: &InboundControlRequest) -> ControlResponse {
        let Some(tool) = request.as_can_use_tool() else {
            return ControlResponse::error(&request.request_id, "malformed can_use_tool request");
        };

        let result = match &self.permission {
            None => PermissionResult::allow(),
            Some(handler) => {
                let ctx = PermissionContext {
                    suggestions: tool.suggestions(),
                    blocked_path: tool.blocked_path.clone(),
                    decision_reason: tool.decision_reason.clone(),
                    tool_use_id: tool.tool_use_id.clone(),
                    agent_id: tool.agent_id.clone(),
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    handler.can_use_tool(&tool.tool_name, &tool.input, &ctx)
                }));
                match outcome {
                    Ok(result) => result,
                    Err(panic) => {
                        let message = panic_message(&*panic);
                        warn!(tool = %tool.tool_name, %message, "permission handler panicked");
                        return ControlResponse::error(&request.request_id, message);
                    }
                }
            }
        };

        ControlResponse::success(
            &request.request_id,
            Some(result.to_response(&tool.tool_use_id)),
        )
    }

    fn hook_callback(&self, request: &InboundControlRequest) -> ControlResponse {
        let Some(hook) = request.as_hook_callback() else {
            return ControlResponse::error(&request.request_id, "malformed hook_callback request");
        };
        let Some(callback) = self.hooks.get(&hook.callback_id) else {
            debug!(callback_id = %hook.callback_id, "no hook registered for callback id");
            return ControlResponse::success(&request.request_id, None);
        };

        let input = HookInput {
            event: &hook.hook_event,
            input: &hook.input,
            tool_use_id: &hook.tool_use_id,
        };
        match catch_unwind(AssertUnwindSafe(|| callback.invoke(input))) {
            Ok(Ok(output)) => {
                let body = output.and_then(|o| serde_json::to_value(o).ok());
                ControlResponse::success(&request.request_id, body)
            }
            Ok(Err(e)) => {
                warn!(event = %hook.hook_event, error = %e, "hook callback failed");
                ControlResponse::error(&request.request_id, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                warn!(event = %hook.hook_event, %message, "hook callback panicked");
                ControlResponse::error(&request.request_id, message)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("callback panicked: {detail}")
}
