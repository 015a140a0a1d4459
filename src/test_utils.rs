#![cfg(test)]

use crate::transport::{Exchange, RawResponse, Transport};
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use http::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// A transport the tests drive by hand: `execute` parks every call
/// until the test finishes it explicitly via [`finish_next`].
///
/// [`finish_next`]: ManualTransport::finish_next
#[derive(Debug, Default)]
pub(crate) struct ManualTransport {
    pending: Mutex<VecDeque<oneshot::Sender<Result<RawResponse>>>>,
    started: AtomicUsize,
}

impl ManualTransport {
    /// How many calls the dispatcher has started so far.
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Completes the oldest still-pending call with `result`. Returns
    /// false when nothing is pending. Sending to an aborted call is
    /// fine; the result just goes nowhere.
    pub(crate) fn finish_next(&self, result: Result<RawResponse>) -> bool {
        let sender = self.pending.lock().unwrap().pop_front();
        match sender {
            Some(sender) => {
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }

    pub(crate) fn ok(status: u16, body: &[u8]) -> Result<RawResponse> {
        Ok(RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_vec(),
        })
    }
}

impl Transport for ManualTransport {
    fn execute(&self, _exchange: Exchange) -> BoxFuture<'static, Result<RawResponse>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back(tx);
        self.started.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("transport shut down")),
            }
        })
    }
}
