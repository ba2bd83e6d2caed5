//! Command line and environment for the claude subprocess.
//!
//! The CLI always runs in bidirectional stream-json mode. Prompts, system
//! prompts, agents, hooks and sandbox settings travel over stdin, not argv.

use std::ffi::OsString;

use crate::config::{ClientConfig, ThinkingMode};

/// Value of `CLAUDE_CODE_ENTRYPOINT` announced to the CLI.
pub const ENTRYPOINT: &str = "sdk-rust";

/// Version of this crate, exported as `CLAUDE_AGENT_SDK_VERSION`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Host variables never passed through to the child.
const STRIPPED_ENV: &[&str] = &["CLAUDECODE", "CLAUDE_CODE_ENTRYPOINT", "MAX_THINKING_TOKENS"];

/// Build CLI arguments.
pub(crate) fn build_args(config: &ClientConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "--output-format",
        "stream-json",
        "--input-format",
        "stream-json",
        "--verbose",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let mut flag = |name: &str, value: String| {
        args.push(name.to_string());
        args.push(value);
    };

    if let Some(ref model) = config.model {
        flag("--model", model.to_string());
    }
    flag("--thinking", config.thinking.as_str().to_string());
    if let Some(turns) = config.max_turns.filter(|t| *t > 0) {
        flag("--max-turns", turns.to_string());
    }
    if let Some(effort) = config.effort {
        flag("--effort", effort.as_str().to_string());
    }
    if let Some(ref id) = config.resume {
        flag("--resume", id.to_string());
    }
    if !config.allowed_tools.is_empty() {
        flag("--allowedTools", config.allowed_tools.join(","));
    }
    if !config.disallowed_tools.is_empty() {
        flag("--disallowedTools", config.disallowed_tools.join(","));
    }
    if let Some(mode) = config.permission_mode {
        flag("--permission-mode", mode.to_string());
    }
    if !config.betas.is_empty() {
        flag("--betas", config.betas.join(","));
    }
    if let Some(ref model) = config.fallback_model {
        flag("--fallback-model", model.to_string());
    }
    if let Some(budget) = config.max_budget_usd {
        flag("--max-budget-usd", format!("{budget:.6}"));
    }
    if let Some(ref dir) = config.working_directory {
        flag("--cwd", dir.display().to_string());
    }
    if let Some(ref name) = config.permission_prompt_tool_name {
        flag("--permission-prompt-tool-name", name.clone());
    }
    for plugin in &config.plugins {
        if !plugin.path.as_os_str().is_empty() {
            flag("--plugin-dir", plugin.path.display().to_string());
        }
    }
    if !config.setting_sources.is_empty() {
        let sources: Vec<&str> = config.setting_sources.iter().map(|s| s.as_str()).collect();
        flag("--setting-sources", sources.join(","));
    }
    if !config.mcp_servers.is_empty() {
        let mcp = serde_json::json!({ "mcpServers": config.mcp_servers });
        flag("--mcp-config", mcp.to_string());
    }

    for (enabled, name) in [
        (config.continue_session, "--continue"),
        (config.fork_session, "--fork-session"),
        (
            config.allow_dangerously_skip_permissions,
            "--allow-dangerously-skip-permissions",
        ),
        (config.include_partial_messages, "--include-partial-messages"),
        (config.enable_file_checkpointing, "--enable-file-checkpointing"),
        (config.strict_mcp_config, "--strict-mcp-config"),
    ] {
        if enabled {
            args.push(name.to_string());
        }
    }

    args
}

/// Build the child's complete environment from the host's.
///
/// Host variables are inherited except the ones this crate owns. User
/// variables are applied last and win over everything else.
pub(crate) fn build_env(
    config: &ClientConfig,
    host: impl IntoIterator<Item = (OsString, OsString)>,
) -> Vec<(OsString, OsString)> {
    let mut env: Vec<(OsString, OsString)> = host
        .into_iter()
        .filter(|(key, _)| {
            let key = key.to_string_lossy();
            !STRIPPED_ENV.contains(&key.as_ref()) && !config.env_vars.contains_key(key.as_ref())
        })
        .collect();

    let mut set = |key: &str, value: String| env.push((key.into(), value.into()));

    set("CLAUDE_CODE_ENTRYPOINT", ENTRYPOINT.to_string());
    set("CLAUDE_AGENT_SDK_VERSION", SDK_VERSION.to_string());
    if config.thinking == ThinkingMode::Disabled {
        set("MAX_THINKING_TOKENS", "0".to_string());
    } else if let Some(tokens) = config.max_thinking_tokens.filter(|t| *t > 0) {
        set("MAX_THINKING_TOKENS", tokens.to_string());
    }
    for (key, value) in &config.env_vars {
        set(key, value.clone());
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        EffortLevel, McpServerConfig, Model, PermissionMode, SdkPluginConfig, SettingSource,
    };

    fn value_of<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    fn env_of(env: &[(OsString, OsString)], key: &str) -> Option<String> {
        env.iter()
            .filter(|(k, _)| k == key)
            .last()
            .map(|(_, v)| v.to_string_lossy().into_owned())
    }

    #[test]
    fn build_args_basic() {
        let config = ClientConfig::builder().build().unwrap();
        let args = build_args(&config);

        assert_eq!(
            &args[..5],
            [
                "--output-format",
                "stream-json",
                "--input-format",
                "stream-json",
                "--verbose"
            ]
        );
        assert_eq!(value_of(&args, "--model"), Some("claude-sonnet-4-6"));
        assert_eq!(value_of(&args, "--thinking"), Some("adaptive"));
        assert_eq!(value_of(&args, "--permission-mode"), Some("bypassPermissions"));
        assert!(args.contains(&"--allow-dangerously-skip-permissions".to_string()));
        // The prompt never goes on the command line.
        assert!(!args.contains(&"-p".to_string()));
        assert!(!args.contains(&"--print".to_string()));
    }

    #[test]
    fn build_args_with_options() {
        let config = ClientConfig::builder()
            .model(Model::Opus)
            .fallback_model("claude-haiku-4-5")
            .max_turns(3)
            .effort(EffortLevel::High)
            .resume("session-123")
            .fork_session(true)
            .allowed_tools(["Read", "Glob"])
            .disallowed_tools(["Bash"])
            .betas(["context-1m"])
            .max_budget_usd(2.5)
            .include_partial_messages(true)
            .build()
            .unwrap();

        let args = build_args(&config);
        assert_eq!(value_of(&args, "--model"), Some("opus"));
        assert_eq!(value_of(&args, "--fallback-model"), Some("claude-haiku-4-5"));
        assert_eq!(value_of(&args, "--max-turns"), Some("3"));
        assert_eq!(value_of(&args, "--effort"), Some("high"));
        assert_eq!(value_of(&args, "--resume"), Some("session-123"));
        assert_eq!(value_of(&args, "--allowedTools"), Some("Read,Glob"));
        assert_eq!(value_of(&args, "--disallowedTools"), Some("Bash"));
        assert_eq!(value_of(&args, "--betas"), Some("context-1m"));
        assert_eq!(value_of(&args, "--max-budget-usd"), Some("2.500000"));
        assert!(args.contains(&"--fork-session".to_string()));
        assert!(args.contains(&"--include-partial-messages".to_string()));
        assert!(!args.contains(&"--continue".to_string()));
    }

    #[test]
    fn build_args_without_model_or_skip_permissions() {
        let config = ClientConfig::builder()
            .cli_default_model()
            .permission_mode(PermissionMode::Default)
            .allow_dangerously_skip_permissions(false)
            .build()
            .unwrap();

        let args = build_args(&config);
        assert!(value_of(&args, "--model").is_none());
        assert_eq!(value_of(&args, "--permission-mode"), Some("default"));
        assert!(!args.contains(&"--allow-dangerously-skip-permissions".to_string()));
    }

    #[test]
    fn build_args_with_extensions() {
        let config = ClientConfig::builder()
            .plugin(SdkPluginConfig::local("/opt/plugins/review"))
            .plugin(SdkPluginConfig::local("/opt/plugins/lint"))
            .setting_sources([SettingSource::User, SettingSource::Project])
            .mcp_server(
                "fs",
                McpServerConfig::Stdio {
                    command: "mcp-fs".into(),
                    args: Vec::new(),
                    env: Default::default(),
                },
            )
            .strict_mcp_config(true)
            .build()
            .unwrap();

        let args = build_args(&config);
        let plugin_dirs: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "--plugin-dir")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(plugin_dirs, ["/opt/plugins/review", "/opt/plugins/lint"]);
        assert_eq!(value_of(&args, "--setting-sources"), Some("user,project"));

        let mcp: serde_json::Value =
            serde_json::from_str(value_of(&args, "--mcp-config").unwrap()).unwrap();
        assert_eq!(mcp["mcpServers"]["fs"]["command"], "mcp-fs");
        assert!(args.contains(&"--strict-mcp-config".to_string()));
    }

    #[test]
    fn build_env_strips_and_sets_owned_variables() {
        let config = ClientConfig::builder().build().unwrap();
        let host = vec![
            ("PATH".into(), "/usr/bin".into()),
            ("CLAUDECODE".into(), "1".into()),
            ("CLAUDE_CODE_ENTRYPOINT".into(), "cli".into()),
            ("MAX_THINKING_TOKENS".into(), "9999".into()),
        ];
        let env = build_env(&config, host);

        assert_eq!(env_of(&env, "PATH").as_deref(), Some("/usr/bin"));
        assert!(env_of(&env, "CLAUDECODE").is_none());
        assert!(env_of(&env, "MAX_THINKING_TOKENS").is_none());
        assert_eq!(env_of(&env, "CLAUDE_CODE_ENTRYPOINT").as_deref(), Some("sdk-rust"));
        assert_eq!(
            env_of(&env, "CLAUDE_AGENT_SDK_VERSION").as_deref(),
            Some(SDK_VERSION)
        );
        assert_eq!(
            env.iter().filter(|(k, _)| k == "CLAUDE_CODE_ENTRYPOINT").count(),
            1
        );
    }

    #[test]
    fn build_env_thinking_budget() {
        let disabled = ClientConfig::builder()
            .thinking(ThinkingMode::Disabled)
            .max_thinking_tokens(4096)
            .build()
            .unwrap();
        let env = build_env(&disabled, Vec::new());
        assert_eq!(env_of(&env, "MAX_THINKING_TOKENS").as_deref(), Some("0"));

        let capped = ClientConfig::builder()
            .max_thinking_tokens(4096)
            .build()
            .unwrap();
        let env = build_env(&capped, Vec::new());
        assert_eq!(env_of(&env, "MAX_THINKING_TOKENS").as_deref(), Some("4096"));
    }

    #[test]
    fn build_env_user_variables_win() {
        let config = ClientConfig::builder()
            .env("HOME", "/sandbox")
            .env("CLAUDE_CODE_ENTRYPOINT", "custom")
            .build()
            .unwrap();
        let host = vec![("HOME".into(), "/root".into())];
        let env = build_env(&config, host);

        assert_eq!(env.iter().filter(|(k, _)| k == "HOME").count(), 1);
        assert_eq!(env_of(&env, "HOME").as_deref(), Some("/sandbox"));
        assert_eq!(env_of(&env, "CLAUDE_CODE_ENTRYPOINT").as_deref(), Some("custom"));
    }
}
