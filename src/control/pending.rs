//! Correlation of outbound control requests with their responses.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::protocol::ControlResponse;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Table {
    waiters: HashMap<String, oneshot::Sender<ControlResponse>>,
    closed: bool,
}

/// Map of request id to the single-use slot its response is delivered into.
///
/// Each id resolves at most once. After [`close`](Self::close) every waiter
/// observes [`Error::SessionClosed`] and new registrations fail.
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<Table>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // Every critical section is a single map operation.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve a slot for `request_id`.
    ///
    /// Must happen before the request is written so that a fast response
    /// always finds its waiter.
    pub fn register(&self, request_id: impl Into<String>) -> Result<PendingReply> {
        let request_id = request_id.into();
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.lock();
            if table.closed {
                return Err(Error::SessionClosed);
            }
            if table.waiters.contains_key(&request_id) {
                return Err(Error::DuplicateRequestId(request_id));
            }
            table.waiters.insert(request_id.clone(), tx);
        }
        Ok(PendingReply {
            request_id,
            rx,
            table: self.clone(),
        })
    }

    /// Deliver a response. Returns `false` when nobody is waiting for the id.
    pub fn resolve(&self, request_id: &str, response: ControlResponse) -> bool {
        let waiter = self.lock().waiters.remove(request_id);
        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Drop the slot for `request_id` without delivering anything.
    pub fn cancel(&self, request_id: &str) -> bool {
        self.lock().waiters.remove(request_id).is_some()
    }

    /// Fail every outstanding waiter and refuse new registrations.
    pub fn close(&self) {
        let drained: Vec<_> = {
            let mut table = self.lock();
            table.closed = true;
            table.waiters.drain().collect()
        };
        // Senders are dropped outside the lock; waiters wake with SessionClosed.
        drop(drained);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Future resolving to the response for one registered request.
///
/// Dropping it before completion removes the entry from the table.
#[derive(Debug)]
pub struct PendingReply {
    request_id: String,
    rx: oneshot::Receiver<ControlResponse>,
    table: PendingRequests,
}

impl PendingReply {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Future for PendingReply {
    type Output = Result<ControlResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| Error::SessionClosed))
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table.cancel(&self.request_id);
    }
}
