//! Configuration for agent runs and sessions.
//!
//! This module provides:
//!
//! - [`ClientConfig`] and [`ClientConfigBuilder`] for configuring the client
//! - Type-safe options like [`Model`], [`PermissionMode`], and [`ThinkingMode`]
//! - Extension settings: [`McpServerConfig`], [`AgentDefinition`],
//!   [`SdkPluginConfig`], [`SandboxSettings`]
//!
//! Authentication is not configured here: the CLI inherits the host
//! environment, so whatever login the host has is used.
//!
//! # Example
//!
//! ```ignore
//! use libclaude_agent::config::{ClientConfig, Model, ThinkingMode};
//!
//! let config = ClientConfig::builder()
//!     .model(Model::Opus)
//!     .thinking(ThinkingMode::Disabled)
//!     .max_turns(4)
//!     .build()?;
//! ```

pub mod builder;
pub mod options;

pub use builder::{ClientConfig, ClientConfigBuilder, DEFAULT_EVENT_CAPACITY, DEFAULT_SHUTDOWN_GRACE};
pub use options::{
    AgentDefinition, EffortLevel, McpServerConfig, Model, NetworkSandboxSettings, OutputFormat,
    PermissionMode, SandboxIgnoreViolations, SandboxSettings, SdkPluginConfig, SessionId,
    SettingSource, ThinkingMode, DEFAULT_MODEL,
};
