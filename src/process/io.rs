//! I/O primitives for the CLI's stdin and stderr.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::protocol::encode;
use crate::{Error, Result};

/// Boxed write half of the child's stdin.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Most stderr kept for error reporting (64 KiB).
pub const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Serializes concurrent writes to the CLI stdin.
///
/// Every call writes one complete line while holding the lock, so lines from
/// different callers never interleave. Once closed, writes fail with
/// [`Error::InputClosed`].
pub struct InputWriter {
    sink: Mutex<Option<BoxedWriter>>,
    closed: AtomicBool,
}

impl InputWriter {
    pub fn new(sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            sink: Mutex::new(Some(Box::new(sink))),
            closed: AtomicBool::new(false),
        }
    }

    /// Encode `value` as one line and write it.
    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let line = encode(value)?;
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(Error::InputClosed)?;
        let written = async {
            sink.write_all(&line).await?;
            sink.flush().await
        }
        .await;

        if let Err(e) = written {
            // A broken pipe means the child is gone; no later write can succeed.
            debug!(error = %e, "write to claude stdin failed, closing input");
            *guard = None;
            self.closed.store(true, Ordering::SeqCst);
            return Err(Error::io(e));
        }
        Ok(())
    }

    /// Close stdin, signalling end of input to the CLI. Idempotent.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let taken = self.sink.lock().await.take();
        if let Some(mut sink) = taken {
            if let Err(e) = sink.shutdown().await {
                trace!(error = %e, "closing claude stdin");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for InputWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputWriter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Drain the CLI stderr in the background.
///
/// Each line is traced as it arrives. The first [`MAX_STDERR_BYTES`] are kept
/// and returned when the stream ends.
pub fn collect_stderr(stderr: impl AsyncRead + Send + Unpin + 'static) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut output = String::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    trace!(target: "libclaude_agent::stderr", "{line}");
                    if output.len() + line.len() < MAX_STDERR_BYTES {
                        output.push_str(&line);
                        output.push('\n');
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "reading claude stderr failed");
                    break;
                }
            }
        }
        output
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writes_one_line_per_call() {
        let (client, mut server) = tokio::io::duplex(1024);
        let writer = InputWriter::new(client);

        writer.write(&json!({"type": "user", "n": 1})).await.unwrap();
        writer.write(&json!({"type": "user", "n": 2})).await.unwrap();
        writer.close().await;

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        assert_eq!(
            out,
            "{\"n\":1,\"type\":\"user\"}\n{\"n\":2,\"type\":\"user\"}\n"
        );
    }

    #[tokio::test]
    async fn concurrent_writes_never_interleave() {
        let (client, mut server) = tokio::io::duplex(64);
        let writer = Arc::new(InputWriter::new(client));

        let reader = tokio::spawn(async move {
            let mut out = String::new();
            server.read_to_string(&mut out).await.unwrap();
            out
        });

        let mut tasks = Vec::new();
        for i in 0..16 {
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                let payload = "x".repeat(100 + i);
                writer.write(&json!({"i": i, "payload": payload})).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        writer.close().await;

        let out = reader.await.unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 16);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            let i = value["i"].as_u64().unwrap() as usize;
            assert_eq!(value["payload"].as_str().unwrap().len(), 100 + i);
        }
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let writer = InputWriter::new(client);
        assert!(!writer.is_closed());

        writer.close().await;
        writer.close().await;
        assert!(writer.is_closed());
        assert!(matches!(
            writer.write(&json!({})).await,
            Err(Error::InputClosed)
        ));
    }

    #[tokio::test]
    async fn stderr_is_collected() {
        let (mut client, server) = tokio::io::duplex(64);
        let handle = collect_stderr(server);

        client.write_all(b"warning: one\nerror: bad flag\n").await.unwrap();
        drop(client);

        assert_eq!(handle.await.unwrap(), "warning: one\nerror: bad flag\n");
    }
}
