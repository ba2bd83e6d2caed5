//! Control-plane state: request correlation and servicing of CLI callbacks.
//!
//! - [`PendingRequests`] pairs host-initiated requests with their responses
//! - [`ControlHandler`] answers requests initiated by the CLI, delegating to a
//!   [`PermissionHandler`] and the registered hooks

mod handler;
mod hooks;
mod pending;
mod permission;

pub use handler::ControlHandler;
pub use hooks::{HookCallback, HookError, HookEvent, HookInput, HookMatcher, HookOutput, HookRegistry};
pub use pending::{PendingReply, PendingRequests};
pub use permission::{
    PermissionBehavior, PermissionContext, PermissionHandler, PermissionResult,
    PermissionRuleValue, PermissionUpdate, PermissionUpdateDestination,
};
