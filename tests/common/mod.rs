//! Test utilities for libclaude-agent integration tests.
//!
//! [`fake_cli`] returns a [`Transport`] for the library and a [`FakeCli`] that
//! plays the CLI's side of the protocol over in-memory pipes.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use libclaude_agent::process::{ChildProcess, ExitReport, Transport};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::watch;

/// Longest a test waits for the library to write something.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct ProcessState {
    terminates: AtomicUsize,
    kills: AtomicUsize,
    ignore_sigterm: bool,
    exit: watch::Sender<Option<ExitReport>>,
}

impl ProcessState {
    fn exit_with(&self, report: ExitReport) {
        self.exit.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(report);
            true
        });
    }
}

/// A child process that exits when signalled or told to.
#[derive(Debug, Clone)]
pub struct MockProcess {
    state: Arc<ProcessState>,
}

impl ChildProcess for MockProcess {
    fn wait(&mut self) -> BoxFuture<'_, io::Result<ExitReport>> {
        let mut exit = self.state.exit.subscribe();
        Box::pin(async move {
            let report = exit
                .wait_for(Option::is_some)
                .await
                .map_err(|_| io::Error::other("mock process dropped"))?;
            Ok(report.clone().unwrap_or_default())
        })
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.state.terminates.fetch_add(1, Ordering::SeqCst);
        if !self.state.ignore_sigterm {
            self.state.exit_with(ExitReport {
                code: None,
                status: "signal: 15 (SIGTERM)".into(),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.state.kills.fetch_add(1, Ordering::SeqCst);
        self.state.exit_with(ExitReport {
            code: None,
            status: "signal: 9 (SIGKILL)".into(),
            stderr: String::new(),
        });
        Ok(())
    }
}

/// The CLI's end of the pipes.
pub struct FakeCli {
    stdout: Option<DuplexStream>,
    stdin: Lines<BufReader<DuplexStream>>,
    state: Arc<ProcessState>,
}

/// A transport wired to a fake CLI.
pub fn fake_cli() -> (Transport, FakeCli) {
    build(false)
}

/// Like [`fake_cli`], but the process only dies on SIGKILL.
pub fn stubborn_cli() -> (Transport, FakeCli) {
    build(true)
}

fn build(ignore_sigterm: bool) -> (Transport, FakeCli) {
    let (stdout_host, stdout_cli) = tokio::io::duplex(64 * 1024);
    let (stdin_host, stdin_cli) = tokio::io::duplex(64 * 1024);
    let (exit, _) = watch::channel(None);
    let state = Arc::new(ProcessState {
        terminates: AtomicUsize::new(0),
        kills: AtomicUsize::new(0),
        ignore_sigterm,
        exit,
    });

    let process = MockProcess {
        state: state.clone(),
    };
    let transport = Transport::new(stdout_host, stdin_host, process);
    let cli = FakeCli {
        stdout: Some(stdout_cli),
        stdin: BufReader::new(stdin_cli).lines(),
        state,
    };
    (transport, cli)
}

impl FakeCli {
    /// Emit one JSON line on stdout.
    pub async fn send(&mut self, value: Value) {
        self.send_raw(&value.to_string()).await;
    }

    /// Emit raw text on stdout, newline appended.
    pub async fn send_raw(&mut self, line: &str) {
        let stdout = self.stdout.as_mut().expect("stdout already closed");
        stdout.write_all(line.as_bytes()).await.unwrap();
        stdout.write_all(b"\n").await.unwrap();
    }

    /// Next line the library wrote to stdin, or `None` once stdin is closed.
    pub async fn try_recv(&mut self) -> Option<Value> {
        let line = tokio::time::timeout(STEP_TIMEOUT, self.stdin.next_line())
            .await
            .expect("timed out waiting for stdin")
            .unwrap()?;
        Some(serde_json::from_str(&line).expect("stdin line is JSON"))
    }

    /// Next line the library wrote to stdin.
    pub async fn recv(&mut self) -> Value {
        self.try_recv().await.expect("stdin closed")
    }

    /// Read the initialize request and acknowledge it.
    pub async fn handshake(&mut self) -> Value {
        let init = self.recv().await;
        assert_eq!(init["type"], "control_request");
        assert_eq!(init["request"]["subtype"], "initialize");
        let request_id = init["request_id"].as_str().unwrap().to_string();
        self.send(control_success(&request_id, None)).await;
        init
    }

    /// Read a user message and return its prompt.
    pub async fn recv_prompt(&mut self) -> String {
        let message = self.recv().await;
        assert_eq!(message["type"], "user");
        message["message"]["content"].as_str().unwrap().to_string()
    }

    /// Close stdout and report `code` with `stderr` as the exit.
    pub fn exit(&mut self, code: i32, stderr: &str) {
        self.stdout = None;
        self.state.exit_with(ExitReport {
            code: Some(code),
            status: format!("exit status: {code}"),
            stderr: stderr.to_string(),
        });
    }

    pub fn terminates(&self) -> usize {
        self.state.terminates.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.state.kills.load(Ordering::SeqCst)
    }
}

// -----------------------------------------------------------------------------
// Message builders
// -----------------------------------------------------------------------------

pub fn system_init(session_id: &str) -> Value {
    json!({
        "type": "system",
        "subtype": "init",
        "session_id": session_id,
        "cwd": "/tmp",
        "model": "claude-sonnet-4-6",
        "tools": ["Read", "Bash"],
        "permissionMode": "default"
    })
}

pub fn assistant_text(text: &str) -> Value {
    json!({
        "type": "assistant",
        "message": {
            "role": "assistant",
            "model": "claude-sonnet-4-6",
            "content": [{"type": "text", "text": text}]
        },
        "session_id": "test-session"
    })
}

pub fn result_success(text: &str, session_id: &str) -> Value {
    json!({
        "type": "result",
        "subtype": "success",
        "is_error": false,
        "duration_ms": 1200,
        "num_turns": 1,
        "result": text,
        "total_cost_usd": 0.0025,
        "usage": {"input_tokens": 10, "output_tokens": 5},
        "session_id": session_id
    })
}

pub fn control_request(request_id: &str, request: Value) -> Value {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": request
    })
}

pub fn can_use_tool(request_id: &str, tool: &str, input: Value) -> Value {
    control_request(
        request_id,
        json!({
            "subtype": "can_use_tool",
            "tool_name": tool,
            "tool_use_id": format!("toolu_{request_id}"),
            "input": input
        }),
    )
}

pub fn control_success(request_id: &str, response: Option<Value>) -> Value {
    let mut body = json!({"subtype": "success", "request_id": request_id});
    if let Some(response) = response {
        body["response"] = response;
    }
    json!({"type": "control_response", "response": body})
}

pub fn control_error(request_id: &str, error: &str) -> Value {
    json!({
        "type": "control_response",
        "response": {"subtype": "error", "request_id": request_id, "error": error}
    })
}
