//! # libclaude-agent
//!
//! Async Rust driver for the Claude CLI's bidirectional stream-json protocol.
//!
//! One CLI subprocess is driven over stdin/stdout with newline-delimited JSON.
//! This library provides:
//! - Single-turn runs and multi-turn sessions over one long-lived process
//! - An ordered event stream with control traffic filtered out
//! - Mid-run control requests (model, permission mode, thinking budget)
//! - Host-side permission decisions and hook callbacks
//! - Graceful shutdown with SIGTERM → SIGKILL escalation
//!
//! ## Quick Start
//!
//! ```ignore
//! use libclaude_agent::{ClaudeClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClaudeClient::new()?;
//!     let result = client.run("What is 2+2?").await?;
//!     println!("{}", result.result.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut stream = client.query("Write a poem").await?;
//! let control = stream.control();
//! while let Some(event) = stream.next().await {
//!     if let Some(delta) = event.as_stream_event().and_then(|e| e.text_delta()) {
//!         print!("{delta}");
//!     }
//! }
//! ```
//!
//! ## Multi-turn Sessions
//!
//! ```ignore
//! let mut session = client.start_session().await?;
//! session.ask("My name is Alice").await?;
//! let answer = session.ask("What's my name?").await?;
//! session.close().await?;
//! ```
//!
//! ## Permissions
//!
//! ```ignore
//! use libclaude_agent::{ClaudeClient, PermissionContext, PermissionResult};
//!
//! let client = ClaudeClient::builder()
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

mod client;
pub mod config;
pub mod control;
mod error;
pub mod process;
pub mod protocol;
mod session;
pub mod stream;

pub use error::{Error, Result};

// Re-export the main client types at crate root
pub use client::{ClaudeClient, ClientBuilder};
pub use session::Session;

// Re-export commonly used config types at crate root
pub use config::{
    ClientConfig, ClientConfigBuilder, EffortLevel, Model, PermissionMode, SessionId,
    ThinkingMode,
};

// Re-export commonly used control types at crate root
pub use control::{
    HookEvent, HookInput, HookMatcher, HookOutput, PermissionContext, PermissionHandler,
    PermissionResult,
};

// Re-export commonly used protocol types at crate root
pub use protocol::{ContentBlock, Event, Message, MessageType, ResultMessage, Usage};

// Re-export commonly used stream types at crate root
pub use stream::{AgentStream, Controller};

pub use process::{ExitReport, Transport};

/// Cancellation signal accepted by the `*_with_cancellation` entry points.
pub use tokio_util::sync::CancellationToken;
