//! Process spawning and lifecycle management.

use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::command::{build_args, build_env};
use super::io::collect_stderr;
use super::Transport;
use crate::config::ClientConfig;
use crate::{Error, Result};

/// How long to wait for stderr to drain once the process has exited.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How a child process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Human-readable exit status.
    pub status: String,
    /// Captured stderr (truncated).
    pub stderr: String,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best diagnostic for a failed run: stderr if any, else the status.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("claude process exited unsuccessfully: {}", self.status)
        } else {
            stderr.to_string()
        }
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status)
    }
}

/// A running child the shutdown coordinator can signal and reap.
///
/// Implemented for the real CLI by [`AgentProcess`]; tests substitute a fake.
pub trait ChildProcess: Send + 'static {
    /// Wait for the process to exit. Must be cancel-safe.
    fn wait(&mut self) -> BoxFuture<'_, io::Result<ExitReport>>;

    /// Ask the process to exit (SIGTERM on unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process to exit (SIGKILL on unix).
    fn kill(&mut self) -> io::Result<()>;
}

/// A spawned Claude CLI process.
///
/// # Cancellation
///
/// Dropping an `AgentProcess` kills the subprocess if it's still running.
pub struct AgentProcess {
    child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl AgentProcess {
    /// Get the process ID of the running CLI.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

impl fmt::Debug for AgentProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentProcess")
            .field("pid", &self.pid())
            .finish()
    }
}

impl ChildProcess for AgentProcess {
    fn wait(&mut self) -> BoxFuture<'_, io::Result<ExitReport>> {
        Box::pin(async move {
            let status = self.child.wait().await?;

            let mut stderr = String::new();
            if let Some(handle) = self.stderr.as_mut() {
                match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, handle).await {
                    Ok(Ok(output)) => stderr = output,
                    Ok(Err(e)) => debug!(error = %e, "stderr collector failed"),
                    Err(_) => debug!("stderr still open after exit, giving up"),
                }
                self.stderr = None;
            }

            Ok(ExitReport {
                code: status.code(),
                status: status.to_string(),
                stderr,
            })
        })
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(|_| io::Error::other("pid out of range"))?;
        trace!(pid, "sending SIGTERM to claude");
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(errno.into()),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        trace!(pid = ?self.child.id(), "killing claude");
        match self.child.start_kill() {
            // Already reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}

/// Spawn the CLI with piped stdio.
///
/// Nothing is written here; the caller sends the initialize request.
pub fn spawn(config: &ClientConfig) -> Result<Transport> {
    let mut cmd = build_command(config);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::CliNotFound {
                searched: config.cli_command().to_string_lossy().into_owned(),
            }
        } else {
            Error::ProcessSpawn(e)
        }
    })?;
    debug!(pid = ?child.id(), "spawned claude");

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let process = AgentProcess {
        child,
        stderr: Some(collect_stderr(stderr)),
    };
    Ok(Transport::new(stdout, stdin, process))
}

fn missing_pipe(name: &str) -> Error {
    Error::ProcessSpawn(io::Error::other(format!("child {name} was not piped")))
}

/// Build a tokio Command from the config.
fn build_command(config: &ClientConfig) -> Command {
    let mut cmd = Command::new(config.cli_command());
    cmd.args(build_args(config));

    cmd.env_clear();
    cmd.envs(build_env(config, std::env::vars_os()));

    if let Some(ref dir) = config.working_directory {
        cmd.current_dir(dir);
    }
    cmd
}
