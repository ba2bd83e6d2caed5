//! Multi-turn conversation sessions.
//!
//! A [`Session`] keeps one CLI process alive across turns. Each turn is one
//! [`send`](Session::send) followed by reading events until the turn's
//! result. Sessions also track the session id and cumulative usage.
//!
//! # Example
//!
//! ```ignore
//! use libclaude_agent::{ClaudeClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClaudeClient::new()?;
//!     let mut session = client.start_session().await?;
//!
//!     session.ask("My name is Alice").await?;
//!     let answer = session.ask("What's my name?").await?;
//!     println!("{}", answer.result.unwrap_or_default());
//!
//!     println!("Total tokens: {}", session.total_usage().total_tokens());
//!     println!("Total cost: ${:.4}", session.total_cost_usd());
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

use crate::config::{Model, PermissionMode, SessionId};
use crate::process::ExitReport;
use crate::protocol::{Event, ResultMessage, Usage};
use crate::stream::{turn_outcome, AgentStream, Controller};
use crate::Result;

/// A multi-turn conversation with one long-lived CLI process.
///
/// Turns are sequential: send a prompt, then drain events until the result
/// before sending the next one. Control operations may run concurrently
/// through a [`Controller`] from [`control`](Self::control).
///
/// # Usage Tracking
///
/// Usage is accumulated from each turn's result. Only events read through
/// this session are counted.
#[derive(Debug)]
pub struct Session {
    stream: AgentStream,
    session_id: Option<SessionId>,
    usage: Usage,
    cost_usd: f64,
    turns: u32,
}

impl Session {
    pub(crate) fn new(stream: AgentStream) -> Self {
        Self {
            stream,
            session_id: None,
            usage: Usage::default(),
            cost_usd: 0.0,
            turns: 0,
        }
    }

    /// Session id reported by the CLI, once seen.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Token usage summed over completed turns.
    pub fn total_usage(&self) -> Usage {
        self.usage
    }

    /// Cost in USD as last reported by the CLI.
    pub fn total_cost_usd(&self) -> f64 {
        self.cost_usd
    }

    /// Number of completed turns.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Send a user message, starting a new turn.
    pub async fn send(&self, prompt: &str) -> Result<()> {
        self.stream.control().send_user_message(prompt).await
    }

    /// The next event, or `None` once the session has ended.
    pub async fn next_event(&mut self) -> Option<Event> {
        let event = self.stream.next_event().await?;
        self.observe(&event);
        Some(event)
    }

    /// Read the events of the current turn, up to and including its result.
    ///
    /// Fails if the process reports an error or the session ends first.
    pub async fn receive_turn(&mut self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            let outcome = turn_outcome(&event);
            events.push(event);
            match outcome {
                Some(Ok(_)) => return Ok(events),
                Some(Err(e)) => return Err(e),
                None => {}
            }
        }
        Err(self.stream.closed_error())
    }

    /// Send `prompt` and wait for the turn's result.
    pub async fn ask(&mut self, prompt: &str) -> Result<ResultMessage> {
        self.send(prompt).await?;
        while let Some(event) = self.next_event().await {
            if let Some(outcome) = turn_outcome(&event) {
                return outcome;
            }
        }
        Err(self.stream.closed_error())
    }

    /// A cloneable handle for control operations.
    pub fn control(&self) -> Controller {
        self.stream.control()
    }

    /// Switch the model for subsequent turns.
    pub async fn set_model(&self, model: impl Into<Model>) -> Result<()> {
        self.stream.control().set_model(model).await
    }

    /// Change the permission mode mid-session.
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.stream.control().set_permission_mode(mode).await
    }

    /// Update the thinking token budget.
    pub async fn set_max_thinking_tokens(&self, tokens: u32) -> Result<()> {
        self.stream.control().set_max_thinking_tokens(tokens).await
    }

    /// Begin graceful shutdown without waiting for it.
    pub fn interrupt(&self) {
        self.stream.interrupt();
    }

    /// Shut the process down and wait until it has been reaped.
    pub async fn close(self) -> Result<ExitReport> {
        let control = self.stream.control();
        control.interrupt();
        control.wait_for_exit().await
    }

    fn observe(&mut self, event: &Event) {
        if let Some(system) = event.as_system() {
            if let Some(id) = system.session_id.as_deref().filter(|id| !id.is_empty()) {
                self.session_id = Some(SessionId::new(id));
            }
        }
        if let Some(result) = event.as_result() {
            self.turns += 1;
            self.usage += result.usage;
            self.cost_usd = result.total_cost_usd;
            if !result.session_id.is_empty() {
                self.session_id = Some(SessionId::new(result.session_id.as_str()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Session>();
    }
}
