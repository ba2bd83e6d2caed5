use std::time::Duration;

/// Errors that can occur when driving a Claude agent process.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Spawn errors: failed to start the CLI process
/// - IO errors: communication failures with the subprocess
/// - Control errors: failures of a single control request/response exchange
/// - Session errors: the agent or its process ended abnormally
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // Spawn errors
    // -------------------------------------------------------------------------
    /// Claude CLI binary not found.
    #[error("claude CLI not found (searched: {searched})")]
    CliNotFound { searched: String },

    /// Failed to spawn the claude subprocess.
    #[error("failed to spawn claude process: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // IO errors
    // -------------------------------------------------------------------------
    /// IO error communicating with the claude subprocess.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    /// Failed to encode or decode JSON.
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// The subprocess input stream has already been closed.
    #[error("input stream closed")]
    InputClosed,

    // -------------------------------------------------------------------------
    // Control errors
    // -------------------------------------------------------------------------
    /// A control request with this identifier is already awaiting a reply.
    #[error("duplicate control request id: {0}")]
    DuplicateRequestId(String),

    /// The CLI answered a control request with an error.
    #[error("control request {subtype} failed: {message}")]
    ControlRequest { subtype: String, message: String },

    /// Operation exceeded the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The governing cancellation token fired.
    #[error("request cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Session errors
    // -------------------------------------------------------------------------
    /// The session ended before the operation could complete.
    #[error("session closed")]
    SessionClosed,

    /// The CLI process failed (bad flag, auth failure, crash).
    #[error("claude process error: {message}")]
    Process { message: String },

    /// The agent finished the turn with an error result.
    #[error("agent error ({subtype}): {message}")]
    AgentError { subtype: String, message: String },

    /// The event stream closed without a result message.
    #[error("agent finished without a result message")]
    NoResult,
}

/// A specialized Result type for libclaude-agent operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a JSON error with context from the offending input.
    pub fn json(source: serde_json::Error, raw: &str) -> Self {
        Self::Json {
            message: format!(
                "at column {}: {}",
                source.column(),
                raw.chars().take(100).collect::<String>()
            ),
            source,
        }
    }

    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Check if this error came from cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::Io(_) | Error::SessionClosed | Error::NoResult
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}
