//! Process reaping and escalating shutdown.
//!
//! One task owns the child for its whole life. It waits for the process to
//! exit on its own, or for the shutdown token to fire, whichever comes first.
//! On shutdown it closes stdin, sends SIGTERM, and sends SIGKILL if the child
//! is still alive after the grace period. The task runs once, so repeated or
//! concurrent triggers produce a single termination sequence.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::process::{ChildProcess, ExitReport, InputWriter};

/// Upper bound on waiting for an in-flight stdin write before signalling.
const CLOSE_INPUT_TIMEOUT: Duration = Duration::from_millis(500);

/// Spawn the coordinator. The receiver yields `Some(report)` once the child
/// has been reaped.
pub(crate) fn spawn_coordinator(
    mut process: Box<dyn ChildProcess>,
    writer: Arc<InputWriter>,
    shutdown: CancellationToken,
    grace: Duration,
) -> watch::Receiver<Option<ExitReport>> {
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        let report = tokio::select! {
            result = process.wait() => {
                let report = report_from(result);
                debug!(status = %report, "claude exited");
                report
            }
            () = shutdown.cancelled() => terminate(process.as_mut(), &writer, grace).await,
        };
        // Nobody may be listening any more.
        let _ = tx.send(Some(report));
    });

    rx
}

async fn terminate(
    process: &mut dyn ChildProcess,
    writer: &InputWriter,
    grace: Duration,
) -> ExitReport {
    debug!("shutting down claude");
    if tokio::time::timeout(CLOSE_INPUT_TIMEOUT, writer.close())
        .await
        .is_err()
    {
        debug!("stdin busy, signalling without closing it");
    }

    if let Err(e) = process.terminate() {
        warn!(error = %e, "failed to send SIGTERM to claude");
    }

    match tokio::time::timeout(grace, process.wait()).await {
        Ok(result) => report_from(result),
        Err(_) => {
            warn!(?grace, "claude still running after SIGTERM, killing");
            if let Err(e) = process.kill() {
                warn!(error = %e, "failed to kill claude");
            }
            report_from(process.wait().await)
        }
    }
}

fn report_from(result: io::Result<ExitReport>) -> ExitReport {
    result.unwrap_or_else(|e| ExitReport {
        code: None,
        status: format!("failed to wait for claude: {e}"),
        stderr: String::new(),
    })
}
