//! Process management for the Claude CLI.
//!
//! One CLI process serves a whole run or session. The host and the CLI talk
//! newline-delimited JSON in both directions; stderr is captured for error
//! reporting.
//!
//! # Architecture
//!
//! ```text
//! libclaude-agent                        claude CLI
//! ┌──────────────┐                      ┌─────────────┐
//! │ InputWriter  │──stdin (requests)───▶│             │
//! │ Dispatcher   │◀─stdout (events)─────│             │
//! │ stderr task  │◀─stderr (logs)───────│             │
//! └──────────────┘                      └─────────────┘
//! ```
//!
//! [`Transport`] bundles the three pieces the engine needs. [`spawn`] builds
//! one for the real CLI; tests build one from in-memory pipes and a fake
//! [`ChildProcess`].

mod command;
mod io;
mod spawn;

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

pub use command::{ENTRYPOINT, SDK_VERSION};
pub use io::{collect_stderr, BoxedWriter, InputWriter, MAX_STDERR_BYTES};
pub use spawn::{spawn, AgentProcess, ChildProcess, ExitReport};

/// Boxed read half of the child's stdout.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// The child's stdio plus its process handle.
pub struct Transport {
    pub(crate) stdout: BoxedReader,
    pub(crate) stdin: BoxedWriter,
    pub(crate) process: Box<dyn ChildProcess>,
}

impl Transport {
    pub fn new(
        stdout: impl AsyncRead + Send + Unpin + 'static,
        stdin: impl AsyncWrite + Send + Unpin + 'static,
        process: impl ChildProcess,
    ) -> Self {
        Self {
            stdout: Box::new(stdout),
            stdin: Box::new(stdin),
            process: Box::new(process),
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}
