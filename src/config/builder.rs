//! Client configuration and builder.
//!
//! # Example
//!
//! ```ignore
//! use libclaude_agent::config::{ClientConfig, Model, PermissionMode};
//!
//! let config = ClientConfig::builder()
//!     .model(Model::Opus)
//!     .permission_mode(PermissionMode::AcceptEdits)
//!     .system_prompt("You are a helpful assistant.")
//!     .max_budget_usd(5.00)
//!     .build()?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::options::{
    AgentDefinition, EffortLevel, McpServerConfig, Model, OutputFormat, PermissionMode,
    SandboxSettings, SdkPluginConfig, SessionId, SettingSource, ThinkingMode,
};
use crate::control::{HookEvent, HookMatcher, PermissionHandler};
use crate::{Error, Result};

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default capacity of the event channel between the reader and the caller.
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Configuration for an agent run or session.
///
/// Use [`ClientConfig::builder()`] to create a new configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // Model
    pub(crate) model: Option<Model>,
    pub(crate) fallback_model: Option<Model>,
    pub(crate) thinking: ThinkingMode,
    pub(crate) max_thinking_tokens: Option<u32>,
    pub(crate) effort: Option<EffortLevel>,
    pub(crate) betas: Vec<String>,

    // System prompts (sent in the initialize request)
    pub(crate) system_prompt: Option<String>,
    pub(crate) append_system_prompt: Option<String>,

    // Session options
    pub(crate) resume: Option<SessionId>,
    pub(crate) continue_session: bool,
    pub(crate) fork_session: bool,
    pub(crate) include_partial_messages: bool,

    // Limits
    pub(crate) max_turns: Option<u32>,
    pub(crate) max_budget_usd: Option<f64>,

    // Tools and permissions
    pub(crate) allowed_tools: Vec<String>,
    pub(crate) disallowed_tools: Vec<String>,
    pub(crate) permission_mode: Option<PermissionMode>,
    pub(crate) allow_dangerously_skip_permissions: bool,
    pub(crate) permission_prompt_tool_name: Option<String>,
    pub(crate) permission_handler: Option<Arc<dyn PermissionHandler>>,
    pub(crate) hooks: BTreeMap<HookEvent, Vec<HookMatcher>>,

    // Extensions
    pub(crate) mcp_servers: BTreeMap<String, McpServerConfig>,
    pub(crate) strict_mcp_config: bool,
    pub(crate) agents: BTreeMap<String, AgentDefinition>,
    pub(crate) plugins: Vec<SdkPluginConfig>,
    pub(crate) setting_sources: Vec<SettingSource>,
    pub(crate) output_format: Option<OutputFormat>,
    pub(crate) sandbox: Option<SandboxSettings>,
    pub(crate) enable_file_checkpointing: bool,

    // Process options
    pub(crate) cli_path: Option<PathBuf>,
    pub(crate) working_directory: Option<PathBuf>,
    pub(crate) env_vars: BTreeMap<String, String>,

    // Engine tuning
    pub(crate) control_timeout: Option<Duration>,
    pub(crate) shutdown_grace: Duration,
    pub(crate) event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: Some(Model::default()),
            fallback_model: None,
            thinking: ThinkingMode::default(),
            max_thinking_tokens: None,
            effort: None,
            betas: Vec::new(),
            system_prompt: None,
            append_system_prompt: None,
            resume: None,
            continue_session: false,
            fork_session: false,
            include_partial_messages: false,
            max_turns: None,
            max_budget_usd: None,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            permission_mode: Some(PermissionMode::BypassPermissions),
            allow_dangerously_skip_permissions: true,
            permission_prompt_tool_name: None,
            permission_handler: None,
            hooks: BTreeMap::new(),
            mcp_servers: BTreeMap::new(),
            strict_mcp_config: false,
            agents: BTreeMap::new(),
            plugins: Vec::new(),
            setting_sources: Vec::new(),
            output_format: None,
            sandbox: None,
            enable_file_checkpointing: false,
            cli_path: None,
            working_directory: None,
            env_vars: BTreeMap::new(),
            control_timeout: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for ClientConfig.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn permission_mode(&self) -> Option<PermissionMode> {
        self.permission_mode
    }

    pub fn working_directory(&self) -> Option<&PathBuf> {
        self.working_directory.as_ref()
    }

    /// Upper bound on waits for control responses, if any.
    pub fn control_timeout(&self) -> Option<Duration> {
        self.control_timeout
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    /// The CLI path, or `claude` resolved through `PATH`.
    pub(crate) fn cli_command(&self) -> &std::ffi::OsStr {
        self.cli_path
            .as_deref()
            .map(|p| p.as_os_str())
            .unwrap_or_else(|| std::ffi::OsStr::new("claude"))
    }
}

/// Builder for [`ClientConfig`].
///
/// Validation happens in [`build()`](ClientConfigBuilder::build); the CLI
/// binary itself is only looked up at spawn time.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    // -------------------------------------------------------------------------
    // Model
    // -------------------------------------------------------------------------

    /// Set the model (default `claude-sonnet-4-6`).
    pub fn model(mut self, model: impl Into<Model>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Let the CLI pick its own default model.
    pub fn cli_default_model(mut self) -> Self {
        self.config.model = None;
        self
    }

    /// Model used when the primary model is unavailable.
    pub fn fallback_model(mut self, model: impl Into<Model>) -> Self {
        self.config.fallback_model = Some(model.into());
        self
    }

    pub fn thinking(mut self, mode: ThinkingMode) -> Self {
        self.config.thinking = mode;
        self
    }

    /// Cap the thinking budget (`MAX_THINKING_TOKENS`).
    pub fn max_thinking_tokens(mut self, tokens: u32) -> Self {
        self.config.max_thinking_tokens = Some(tokens);
        self
    }

    pub fn effort(mut self, effort: EffortLevel) -> Self {
        self.config.effort = Some(effort);
        self
    }

    /// Enable beta feature flags.
    pub fn betas(mut self, betas: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.betas.extend(betas.into_iter().map(Into::into));
        self
    }

    // -------------------------------------------------------------------------
    // System prompts
    // -------------------------------------------------------------------------

    /// Set the system prompt (replaces default).
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Append to the system prompt (added after default).
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.append_system_prompt = Some(prompt.into());
        self
    }

    // -------------------------------------------------------------------------
    // Session options
    // -------------------------------------------------------------------------

    /// Resume a specific session by ID.
    pub fn resume(mut self, id: impl Into<SessionId>) -> Self {
        self.config.resume = Some(id.into());
        self
    }

    /// Continue the most recent session.
    pub fn continue_session(mut self, cont: bool) -> Self {
        self.config.continue_session = cont;
        self
    }

    /// Fork the resumed session into a new session ID.
    pub fn fork_session(mut self, fork: bool) -> Self {
        self.config.fork_session = fork;
        self
    }

    /// Stream partial assistant output as `stream_event` messages.
    pub fn include_partial_messages(mut self, include: bool) -> Self {
        self.config.include_partial_messages = include;
        self
    }

    // -------------------------------------------------------------------------
    // Limits
    // -------------------------------------------------------------------------

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.config.max_turns = Some(turns);
        self
    }

    /// Set the maximum budget in USD.
    ///
    /// The CLI will stop when this budget is reached.
    pub fn max_budget_usd(mut self, budget: f64) -> Self {
        self.config.max_budget_usd = Some(budget);
        self
    }

    // -------------------------------------------------------------------------
    // Tools and permissions
    // -------------------------------------------------------------------------

    /// Restrict the built-in tools that may be used.
    pub fn allowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Block specific tools.
    pub fn disallowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set the permission mode (default `bypassPermissions`).
    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.config.permission_mode = Some(mode);
        self
    }

    /// Whether to pass `--allow-dangerously-skip-permissions` (default true).
    pub fn allow_dangerously_skip_permissions(mut self, allow: bool) -> Self {
        self.config.allow_dangerously_skip_permissions = allow;
        self
    }

    /// MCP tool used for permission prompts.
    pub fn permission_prompt_tool_name(mut self, name: impl Into<String>) -> Self {
        self.config.permission_prompt_tool_name = Some(name.into());
        self
    }

    /// Decide `can_use_tool` requests. Without a handler every call is allowed.
    pub fn permission_handler(mut self, handler: impl PermissionHandler + 'static) -> Self {
        self.config.permission_handler = Some(Arc::new(handler));
        self
    }

    /// Register hook matchers for a lifecycle event.
    pub fn hook(mut self, event: HookEvent, matcher: HookMatcher) -> Self {
        self.config.hooks.entry(event).or_default().push(matcher);
        self
    }

    // -------------------------------------------------------------------------
    // Extensions
    // -------------------------------------------------------------------------

    pub fn mcp_server(mut self, name: impl Into<String>, server: McpServerConfig) -> Self {
        self.config.mcp_servers.insert(name.into(), server);
        self
    }

    /// Reject MCP configuration from any other source.
    pub fn strict_mcp_config(mut self, strict: bool) -> Self {
        self.config.strict_mcp_config = strict;
        self
    }

    pub fn agent(mut self, name: impl Into<String>, agent: AgentDefinition) -> Self {
        self.config.agents.insert(name.into(), agent);
        self
    }

    pub fn plugin(mut self, plugin: SdkPluginConfig) -> Self {
        self.config.plugins.push(plugin);
        self
    }

    /// Settings files to load. By default none are loaded.
    pub fn setting_sources(mut self, sources: impl IntoIterator<Item = SettingSource>) -> Self {
        self.config.setting_sources = sources.into_iter().collect();
        self
    }

    /// Request structured output.
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = Some(format);
        self
    }

    pub fn sandbox(mut self, sandbox: SandboxSettings) -> Self {
        self.config.sandbox = Some(sandbox);
        self
    }

    pub fn enable_file_checkpointing(mut self, enable: bool) -> Self {
        self.config.enable_file_checkpointing = enable;
        self
    }

    // -------------------------------------------------------------------------
    // Process options
    // -------------------------------------------------------------------------

    /// Path to claude CLI binary (default: search PATH for "claude").
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cli_path = Some(path.into());
        self
    }

    /// Working directory for the claude process.
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Add/override environment variable for subprocess.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env_vars.insert(key.into(), value.into());
        self
    }

    // -------------------------------------------------------------------------
    // Engine tuning
    // -------------------------------------------------------------------------

    /// Bound every wait for a control response.
    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.config.control_timeout = Some(timeout);
        self
    }

    /// Time between SIGTERM and SIGKILL during shutdown.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Events buffered before the reader waits for the caller.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Build the configuration.
    ///
    /// This validates:
    /// - Budget is positive if set
    /// - Working directory exists if set
    /// - Timeouts and channel capacity are non-zero
    pub fn build(self) -> Result<ClientConfig> {
        let config = self.config;

        if let Some(budget) = config.max_budget_usd {
            if budget.is_nan() || budget <= 0.0 {
                return Err(Error::InvalidConfig(
                    "max_budget_usd must be positive".into(),
                ));
            }
        }

        if let Some(ref dir) = config.working_directory {
            if !dir.is_dir() {
                return Err(Error::InvalidConfig(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        if config.control_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::InvalidConfig(
                "control_timeout must be non-zero".into(),
            ));
        }

        if config.shutdown_grace.is_zero() {
            return Err(Error::InvalidConfig("shutdown_grace must be non-zero".into()));
        }

        if config.event_capacity == 0 {
            return Err(Error::InvalidConfig("event_capacity must be at least 1".into()));
        }

        Ok(config)
    }
}
