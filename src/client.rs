//! High-level client for single-turn runs and multi-turn sessions.
//!
//! This module provides [`ClaudeClient`], the main entry point.
//!
//! # Example
//!
//! ```ignore
//! use libclaude_agent::{ClaudeClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClaudeClient::new()?;
//!
//!     // One prompt, one result
//!     let result = client.run("What is 2+2?").await?;
//!     println!("{}", result.result.unwrap_or_default());
//!
//!     // Streaming events
//!     use futures::StreamExt;
//!     let mut stream = client.query("Write a haiku").await?;
//!     while let Some(event) = stream.next().await {
//!         if let Some(assistant) = event.as_assistant() {
//!             print!("{}", assistant.text());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, ClientConfigBuilder, Model, PermissionMode};
use crate::control::{HookEvent, HookMatcher, PermissionHandler};
use crate::process::{spawn, Transport};
use crate::protocol::ResultMessage;
use crate::session::Session;
use crate::stream::{start, AgentStream, Mode};
use crate::Result;

/// A client for driving the Claude CLI.
///
/// `ClaudeClient` holds the configuration. Every call spawns its own CLI
/// process:
/// - Single-turn runs ([`query`](Self::query), [`run`](Self::run))
/// - Multi-turn sessions ([`start_session`](Self::start_session))
///
/// # Thread Safety
///
/// `ClaudeClient` is `Send + Sync` and cheap to clone, so concurrent runs
/// from several tasks are supported.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    config: Arc<ClientConfig>,
}

impl ClaudeClient {
    /// Create a client with the default configuration.
    pub fn new() -> Result<Self> {
        let config = ClientConfig::builder().build()?;
        Ok(Self::with_config(config))
    }

    /// Create a client with the given configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Create a builder for configuring a new client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get a reference to the client's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one prompt and stream the events of the run.
    ///
    /// The stream ends after the result (stdin is closed so the CLI exits on
    /// its own), when the process exits, or on cancellation.
    ///
    /// # Cancellation
    ///
    /// Dropping the returned [`AgentStream`] shuts the subprocess down.
    pub async fn query(&self, prompt: &str) -> Result<AgentStream> {
        self.query_with_cancellation(prompt, CancellationToken::new())
            .await
    }

    /// Like [`query`](Self::query), governed by `cancel`.
    ///
    /// Cancelling the token aborts pending control requests and shuts the
    /// process down.
    pub async fn query_with_cancellation(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<AgentStream> {
        let transport = spawn(&self.config)?;
        self.query_with_transport(transport, prompt, cancel).await
    }

    /// Run a single turn over an existing transport.
    ///
    /// [`query`](Self::query) uses this with a freshly spawned CLI; other
    /// transports (an in-memory fake, a remote pipe) work the same way.
    pub async fn query_with_transport(
        &self,
        transport: Transport,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<AgentStream> {
        start(transport, &self.config, Mode::SingleTurn, Some(prompt), cancel).await
    }

    /// Send one prompt and wait for the result.
    ///
    /// Intermediate events are discarded; use [`query`](Self::query) to see
    /// them. Error results, process failures (bad flag, auth failure, crash)
    /// and a missing result are all returned as errors.
    pub async fn run(&self, prompt: &str) -> Result<ResultMessage> {
        self.run_with_cancellation(prompt, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), governed by `cancel`.
    pub async fn run_with_cancellation(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<ResultMessage> {
        self.query_with_cancellation(prompt, cancel)
            .await?
            .collect_result()
            .await
    }

    /// Start a multi-turn session.
    ///
    /// The process starts immediately; the first turn begins with
    /// [`Session::send`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut session = client.start_session().await?;
    /// session.send("My name is Alice").await?;
    /// session.receive_turn().await?;
    /// session.send("What is my name?").await?;
    /// let events = session.receive_turn().await?;
    /// session.close().await?;
    /// ```
    pub async fn start_session(&self) -> Result<Session> {
        self.start_session_with_cancellation(CancellationToken::new())
            .await
    }

    /// Like [`start_session`](Self::start_session), governed by `cancel`.
    pub async fn start_session_with_cancellation(
        &self,
        cancel: CancellationToken,
    ) -> Result<Session> {
        let transport = spawn(&self.config)?;
        self.start_session_with_transport(transport, cancel).await
    }

    /// Start a multi-turn session over an existing transport.
    pub async fn start_session_with_transport(
        &self,
        transport: Transport,
        cancel: CancellationToken,
    ) -> Result<Session> {
        let stream = start(transport, &self.config, Mode::MultiTurn, None, cancel).await?;
        Ok(Session::new(stream))
    }
}

/// Builder for [`ClaudeClient`].
///
/// This wraps [`ClientConfigBuilder`] and builds directly into a
/// [`ClaudeClient`]. Options without a shortcut here are reachable through
/// [`configure`](Self::configure).
///
/// # Example
///
/// ```ignore
/// let client = ClaudeClient::builder()
///     .model(Model::Opus)
///     .permission_mode(PermissionMode::AcceptEdits)
///     .configure(|c| c.max_turns(4).effort(EffortLevel::High))
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    inner: ClientConfigBuilder,
}

impl ClientBuilder {
    /// Create a new client builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid (e.g., negative
    /// budget or missing working directory).
    pub fn build(self) -> Result<ClaudeClient> {
        let config = self.inner.build()?;
        Ok(ClaudeClient::with_config(config))
    }

    /// Apply any [`ClientConfigBuilder`] options.
    pub fn configure(mut self, f: impl FnOnce(ClientConfigBuilder) -> ClientConfigBuilder) -> Self {
        self.inner = f(self.inner);
        self
    }

    pub fn model(mut self, model: impl Into<Model>) -> Self {
        self.inner = self.inner.model(model);
        self
    }

    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.inner = self.inner.permission_mode(mode);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.inner = self.inner.system_prompt(prompt);
        self
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.inner = self.inner.max_turns(turns);
        self
    }

    pub fn max_budget_usd(mut self, budget: f64) -> Self {
        self.inner = self.inner.max_budget_usd(budget);
        self
    }

    /// Decide tool permission requests from the CLI.
    pub fn permission_handler(mut self, handler: impl PermissionHandler + 'static) -> Self {
        self.inner = self.inner.permission_handler(handler);
        self
    }

    pub fn hook(mut self, event: HookEvent, matcher: HookMatcher) -> Self {
        self.inner = self.inner.hook(event, matcher);
        self
    }

    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.cli_path(path);
        self
    }

    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.working_directory(path);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner = self.inner.env(key, value);
        self
    }

    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.control_timeout(timeout);
        self
    }
}

impl From<ClientConfigBuilder> for ClientBuilder {
    fn from(inner: ClientConfigBuilder) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffortLevel;
    use crate::control::{PermissionContext, PermissionResult};
    use serde_json::Value;

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClaudeClient>();
        assert_send_sync::<ClientBuilder>();
    }

    #[test]
    fn client_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<ClaudeClient>();
    }

    #[test]
    fn new_uses_defaults() {
        let client = ClaudeClient::new().unwrap();
        assert_eq!(client.config().model(), Some(&Model::default()));
        assert_eq!(
            client.config().permission_mode(),
            Some(PermissionMode::BypassPermissions)
        );
    }

    #[test]
    fn builder_chains_options() {
        let client = ClaudeClient::builder()
            .model(Model::Opus)
            .max_budget_usd(10.0)
            .permission_mode(PermissionMode::AcceptEdits)
            .control_timeout(Duration::from_secs(3))
            .configure(|c| c.effort(EffortLevel::Low))
            .build()
            .unwrap();

        assert_eq!(client.config().model(), Some(&Model::Opus));
        assert_eq!(
            client.config().permission_mode(),
            Some(PermissionMode::AcceptEdits)
        );
        assert_eq!(
            client.config().control_timeout(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn builder_accepts_permission_closure() {
        let client = ClaudeClient::builder()
            .permission_handler(|tool: &str, _: &Value, _: &PermissionContext| {
                if tool == "Bash" {
                    PermissionResult::deny("no shell")
                } else {
                    PermissionResult::allow()
                }
            })
            .build();
        assert!(client.is_ok());
    }

    #[test]
    fn builder_rejects_invalid_budget() {
        let result = ClaudeClient::builder().max_budget_usd(-1.0).build();
        assert!(matches!(result, Err(crate::Error::InvalidConfig(_))));
    }

    #[test]
    fn with_config_works() {
        let config = ClientConfig::builder().cli_default_model().build().unwrap();
        let client = ClaudeClient::with_config(config);
        assert!(client.config().model().is_none());
    }
}
