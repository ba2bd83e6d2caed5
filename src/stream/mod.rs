//! The running agent: an ordered event stream plus control operations.
//!
//! # Overview
//!
//! Starting a run or session spawns two background tasks around the CLI:
//!
//! - the dispatcher, the only reader of stdout, which answers the CLI's
//!   control requests, resolves responses to ours, and forwards domain events
//! - the shutdown coordinator, which owns the process, reaps it, and escalates
//!   from SIGTERM to SIGKILL when shutdown is requested
//!
//! The caller holds an [`AgentStream`] for events and may clone its
//! [`Controller`] into other tasks to change settings mid-run.
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut stream = client.query("Write a haiku").await?;
//! while let Some(event) = stream.next().await {
//!     if let Some(assistant) = event.as_assistant() {
//!         print!("{}", assistant.text());
//!     }
//! }
//! ```
//!
//! # Cancellation
//!
//! Cancelling the token passed at start, calling [`Controller::interrupt`], or
//! dropping the [`AgentStream`] shuts the process down. The event channel
//! always closes afterwards.

mod dispatcher;
mod shutdown;

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ClientConfig, Model, PermissionMode};
use crate::control::{ControlHandler, HookRegistry, PendingReply, PendingRequests};
use crate::process::{ExitReport, InputWriter, Transport};
use crate::protocol::{ControlResponse, Event, OutboundMessage, ResultMessage};
use crate::{Error, Result};

pub(crate) use dispatcher::Mode;
use dispatcher::{Dispatcher, DispatcherParts};
use shutdown::spawn_coordinator;

/// Start the engine on `transport`: spawn the dispatcher and the shutdown
/// coordinator, write `initialize`, then the prompt if one is given.
pub(crate) async fn start(
    transport: Transport,
    config: &ClientConfig,
    mode: Mode,
    prompt: Option<&str>,
    cancel: CancellationToken,
) -> Result<AgentStream> {
    let Transport {
        stdout,
        stdin,
        process,
    } = transport;

    let (hooks, hooks_config) = HookRegistry::build(&config.hooks);
    let handler = ControlHandler::new(config.permission_handler.clone(), hooks);
    let writer = Arc::new(InputWriter::new(stdin));
    let pending = PendingRequests::new();
    let shutdown = cancel.child_token();
    let exit = spawn_coordinator(
        process,
        writer.clone(),
        shutdown.clone(),
        config.shutdown_grace,
    );

    // Open until the first result: a crash before any turn completes is an error.
    let awaiting_result = Arc::new(AtomicBool::new(true));
    let (events_tx, events_rx) = mpsc::channel(config.event_capacity);
    let dispatcher = Dispatcher::new(
        stdout,
        DispatcherParts {
            mode,
            handler,
            pending: pending.clone(),
            writer: writer.clone(),
            events: events_tx,
            cancel: cancel.clone(),
            shutdown: shutdown.clone(),
            exit: exit.clone(),
            awaiting_result: awaiting_result.clone(),
        },
    );
    tokio::spawn(dispatcher.run());

    let controller = Controller {
        inner: Arc::new(Shared {
            writer,
            pending,
            cancel,
            shutdown,
            exit,
            awaiting_result,
            control_timeout: config.control_timeout,
        }),
    };
    let stream = AgentStream {
        events: events_rx,
        controller,
    };

    // Dropping `stream` on error shuts the process down.
    stream.controller.initialize(config, hooks_config).await?;
    if let Some(prompt) = prompt {
        stream.controller.send_user_message(prompt).await?;
    }
    Ok(stream)
}

struct Shared {
    writer: Arc<InputWriter>,
    pending: PendingRequests,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    exit: watch::Receiver<Option<ExitReport>>,
    awaiting_result: Arc<AtomicBool>,
    control_timeout: Option<Duration>,
}

/// Control operations on a running agent.
///
/// Cheap to clone; every clone drives the same process. Requests may be
/// issued concurrently from any task: each waits only for its own response.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("pending", &self.inner.pending.len())
            .field("shutting_down", &self.inner.shutdown.is_cancelled())
            .finish()
    }
}

impl Controller {
    /// Send a control request and wait for its response.
    ///
    /// Returns the response payload, if the CLI sent one. Fails with
    /// [`Error::ControlRequest`] when the CLI answers with an error,
    /// [`Error::Cancelled`] when the caller's token fires,
    /// [`Error::Timeout`] when a control timeout is configured and elapses, and
    /// [`Error::SessionClosed`] when the process ends first.
    pub async fn request(&self, subtype: &str, fields: Map<String, Value>) -> Result<Option<Value>> {
        let request_id = Uuid::new_v4().to_string();
        let reply = self.inner.pending.register(request_id.as_str())?;
        debug!(%request_id, subtype, "sending control request");

        // On failure `reply` is dropped, which removes the entry.
        self.inner
            .writer
            .write(&OutboundMessage::control_request(request_id, subtype, fields))
            .await?;

        let response = self.await_reply(reply).await?;
        if response.is_success() {
            Ok(response.response)
        } else {
            Err(Error::ControlRequest {
                subtype: subtype.to_string(),
                message: response.error_message().to_string(),
            })
        }
    }

    async fn await_reply(&self, reply: PendingReply) -> Result<ControlResponse> {
        let timeout = self.inner.control_timeout;
        let wait = async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, reply)
                    .await
                    .map_err(|_| Error::Timeout(limit))?,
                None => reply.await,
            }
        };
        tokio::select! {
            result = wait => result,
            () = self.inner.cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Switch the model for subsequent turns.
    pub async fn set_model(&self, model: impl Into<Model>) -> Result<()> {
        let model: Model = model.into();
        self.request("set_model", fields(json!({ "model": model.as_str() })))
            .await
            .map(drop)
    }

    /// Change the permission mode mid-session.
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.request(
            "set_permission_mode",
            fields(json!({ "permission_mode": mode.as_str() })),
        )
        .await
        .map(drop)
    }

    /// Update the thinking token budget.
    pub async fn set_max_thinking_tokens(&self, tokens: u32) -> Result<()> {
        self.request(
            "set_max_thinking_tokens",
            fields(json!({ "max_thinking_tokens": tokens })),
        )
        .await
        .map(drop)
    }

    /// Write one user message, starting a new turn.
    pub async fn send_user_message(&self, prompt: &str) -> Result<()> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::SessionClosed);
        }
        self.inner.awaiting_result.store(true, Ordering::SeqCst);
        self.inner.writer.write(&OutboundMessage::user(prompt)).await
    }

    /// Begin graceful shutdown. Idempotent and non-blocking.
    pub fn interrupt(&self) {
        self.inner.shutdown.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Wait until the process has been reaped.
    pub async fn wait_for_exit(&self) -> Result<ExitReport> {
        let mut exit = self.inner.exit.clone();
        let report = exit
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::SessionClosed)?;
        report.clone().ok_or(Error::SessionClosed)
    }

    /// Write the `initialize` request. Its response is only logged.
    async fn initialize(&self, config: &ClientConfig, hooks: Value) -> Result<()> {
        let request_id = Uuid::new_v4().to_string();
        let reply = self.inner.pending.register(request_id.as_str())?;
        self.inner
            .writer
            .write(&OutboundMessage::initialize(request_id, config, hooks))
            .await?;

        tokio::spawn(async move {
            match reply.await {
                Ok(response) if response.is_success() => debug!("claude acknowledged initialize"),
                Ok(response) => {
                    warn!(error = response.error_message(), "claude rejected initialize")
                }
                Err(_) => debug!("session ended before initialize was acknowledged"),
            }
        });
        Ok(())
    }
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Ordered stream of domain events from one agent process.
///
/// Control traffic never appears here. The stream ends when the process
/// exits, after a single-turn result, or on cancellation. Dropping it shuts
/// the process down.
#[derive(Debug)]
pub struct AgentStream {
    events: mpsc::Receiver<Event>,
    controller: Controller,
}

impl AgentStream {
    /// The next event, or `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// A handle for control operations that can outlive borrows of the stream.
    pub fn control(&self) -> Controller {
        self.controller.clone()
    }

    /// Begin graceful shutdown.
    pub fn interrupt(&self) {
        self.controller.interrupt();
    }

    /// Drain events until the result of the current turn.
    ///
    /// Intermediate events are discarded. Process failures and error results
    /// are returned as errors.
    pub async fn collect_result(mut self) -> Result<ResultMessage> {
        self.next_result().await
    }

    pub(crate) async fn next_result(&mut self) -> Result<ResultMessage> {
        while let Some(event) = self.next_event().await {
            if let Some(outcome) = turn_outcome(&event) {
                return outcome;
            }
        }
        Err(self.closed_error())
    }

    /// Why the stream ended without a result.
    pub(crate) fn closed_error(&self) -> Error {
        if self.controller.inner.cancel.is_cancelled() {
            Error::Cancelled
        } else if self.controller.is_interrupted() {
            Error::SessionClosed
        } else {
            Error::NoResult
        }
    }
}

/// The turn's outcome if `event` ends it.
pub(crate) fn turn_outcome(event: &Event) -> Option<Result<ResultMessage>> {
    if event.is_result() {
        let result = match event.as_result() {
            Some(result) => result.clone(),
            None => match serde_json::from_str::<ResultMessage>(&event.raw) {
                Ok(result) => result,
                Err(e) => return Some(Err(Error::json(e, &event.raw))),
            },
        };
        return Some(if result.is_error() {
            Err(Error::AgentError {
                message: result.error_message(),
                subtype: result.subtype,
            })
        } else {
            Ok(result)
        });
    }

    let system = event.as_system().filter(|s| s.is_error())?;
    Some(Err(Error::Process {
        message: system.message.clone().unwrap_or_default(),
    }))
}

impl Stream for AgentStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for AgentStream {
    fn drop(&mut self) {
        self.controller.interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;
    use crate::protocol::Envelope;

    fn event(line: &str) -> Event {
        match decode(line).unwrap().unwrap() {
            Envelope::Event(event) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn stream_is_send() {
        fn assert_send<T: Send>() {}
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send::<AgentStream>();
        assert_send_sync::<Controller>();
    }

    #[test]
    fn success_result_ends_turn() {
        let outcome = turn_outcome(&event(
            r#"{"type":"result","subtype":"success","result":"4","session_id":"s1"}"#,
        ));
        let result = outcome.unwrap().unwrap();
        assert_eq!(result.result.as_deref(), Some("4"));
    }

    #[test]
    fn error_result_becomes_agent_error() {
        let outcome = turn_outcome(&event(
            r#"{"type":"result","subtype":"error_max_turns","is_error":true,"errors":["too many turns"]}"#,
        ));
        match outcome.unwrap() {
            Err(Error::AgentError { subtype, message }) => {
                assert_eq!(subtype, "error_max_turns");
                assert_eq!(message, "too many turns");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn process_error_becomes_error() {
        let outcome = turn_outcome(&Event::process_error("error: bad flag"));
        assert!(matches!(
            outcome,
            Some(Err(Error::Process { message })) if message == "error: bad flag"
        ));
    }

    #[test]
    fn other_events_do_not_end_turn() {
        assert!(turn_outcome(&event(r#"{"type":"system","subtype":"init"}"#)).is_none());
        assert!(turn_outcome(&event(
            r#"{"type":"assistant","message":{"role":"assistant","content":"hi"}}"#
        ))
        .is_none());
    }

    #[test]
    fn control_fields_from_object() {
        let map = fields(json!({"model": "opus"}));
        assert_eq!(map.get("model"), Some(&json!("opus")));
        assert!(fields(json!(null)).is_empty());
    }
}
