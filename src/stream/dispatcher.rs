//! The single reader of the CLI's stdout.
//!
//! Every line is routed by kind: control requests are answered on stdin,
//! control responses resolve pending requests, and everything else is
//! forwarded to the caller in arrival order. The event channel closes when
//! this task returns, which happens exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::control::{ControlHandler, PendingRequests};
use crate::process::{ExitReport, InputWriter};
use crate::protocol::{decode, Envelope, Event, InboundControlRequest, LineCodec, OutboundMessage};
use crate::Error;

/// Whether the stream ends after the first result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// One prompt, one result. The first result closes stdin.
    SingleTurn,
    /// The caller sends prompts until it closes the session.
    MultiTurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// Result seen and stdin closed; waiting for the CLI to exit.
    Draining,
    Done,
}

pub(crate) struct Dispatcher<R> {
    lines: FramedRead<R, LineCodec>,
    mode: Mode,
    state: State,
    handler: ControlHandler,
    pending: PendingRequests,
    writer: Arc<InputWriter>,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    exit: watch::Receiver<Option<ExitReport>>,
    awaiting_result: Arc<AtomicBool>,
}

pub(crate) struct DispatcherParts {
    pub mode: Mode,
    pub handler: ControlHandler,
    pub pending: PendingRequests,
    pub writer: Arc<InputWriter>,
    pub events: mpsc::Sender<Event>,
    /// The caller's token: abandons delivery and exit waits.
    pub cancel: CancellationToken,
    /// Fired when the host asked for shutdown.
    pub shutdown: CancellationToken,
    pub exit: watch::Receiver<Option<ExitReport>>,
    /// Set when a prompt is written, cleared by its result.
    pub awaiting_result: Arc<AtomicBool>,
}

impl<R: AsyncRead + Unpin> Dispatcher<R> {
    pub(crate) fn new(stdout: R, parts: DispatcherParts) -> Self {
        Self {
            lines: FramedRead::new(stdout, LineCodec::new()),
            mode: parts.mode,
            state: State::Running,
            handler: parts.handler,
            pending: parts.pending,
            writer: parts.writer,
            events: parts.events,
            cancel: parts.cancel,
            shutdown: parts.shutdown,
            exit: parts.exit,
            awaiting_result: parts.awaiting_result,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut read_error = None;

        while self.state != State::Done {
            let next = tokio::select! {
                next = self.lines.next() => next,
                () = self.cancel.cancelled() => {
                    debug!("cancelled, stopping stdout reader");
                    self.state = State::Done;
                    break;
                }
            };
            match next {
                Some(Ok(line)) => self.dispatch(&line).await,
                Some(Err(e)) => {
                    read_error = Some(e);
                    break;
                }
                None => break,
            }
        }

        self.finish(read_error).await;
    }

    async fn dispatch(&mut self, line: &str) {
        let envelope = match decode(line) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "skipping undecodable line from claude");
                return;
            }
        };

        match envelope {
            Envelope::ControlRequest(request) => self.answer(&request).await,
            Envelope::ControlResponse(response) => {
                let request_id = response.request_id.clone();
                if !self.pending.resolve(&request_id, response) {
                    debug!(%request_id, "discarding uncorrelated control response");
                }
            }
            Envelope::Event(event) => self.forward(event).await,
        }
    }

    /// Write exactly one response before reading the next line.
    async fn answer(&mut self, request: &InboundControlRequest) {
        let response = self.handler.handle(request);
        if let Err(e) = self
            .writer
            .write(&OutboundMessage::control_response(response))
            .await
        {
            debug!(
                request_id = %request.request_id,
                error = %e,
                "could not answer control request"
            );
        }
    }

    async fn forward(&mut self, event: Event) {
        if self.state == State::Draining {
            trace!(kind = %event.kind, "discarding event after result");
            return;
        }

        let terminal = event.is_result();
        // Cleared before delivery: the caller may send the next prompt as
        // soon as it sees this result.
        if terminal {
            self.awaiting_result.store(false, Ordering::SeqCst);
        }
        if !self.deliver(event).await {
            self.state = State::Done;
            return;
        }
        if terminal && self.mode == Mode::SingleTurn {
            debug!("result received, closing stdin");
            self.writer.close().await;
            self.state = State::Draining;
        }
    }

    /// Send to the caller unless it went away or cancelled.
    async fn deliver(&mut self, event: Event) -> bool {
        tokio::select! {
            sent = self.events.send(event) => sent.is_ok(),
            () = self.cancel.cancelled() => false,
        }
    }

    async fn finish(mut self, read_error: Option<Error>) {
        self.state = State::Done;
        self.pending.close();
        self.writer.close().await;

        if let Some(e) = read_error {
            debug!(error = %e, "reading claude stdout failed");
            self.deliver(Event::process_error(format!("stdout read error: {e}")))
                .await;
        }
        if self.cancel.is_cancelled() || self.events.is_closed() {
            return;
        }

        let report = tokio::select! {
            report = self.exit.wait_for(Option::is_some) => {
                report.ok().and_then(|r| r.clone())
            }
            () = self.cancel.cancelled() => None,
        };
        let Some(report) = report else {
            return;
        };

        let turn_open = self.awaiting_result.load(Ordering::SeqCst);
        if !report.success() && turn_open && !self.shutdown.is_cancelled() {
            debug!(status = %report, "claude exited before the turn's result");
            self.deliver(Event::process_error(report.diagnostic())).await;
        }
    }
}
