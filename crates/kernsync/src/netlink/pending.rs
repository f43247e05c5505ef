//! Results of queued requests.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot::{self, error::TryRecvError};

use super::correlator::Reply;
use super::error::{Error, Result};

/// The eventual result of a request handed to the command thread.
///
/// Await it from async code, or call [`wait`](Self::wait) from a plain
/// thread. If the transport stops before the request runs, the result is
/// [`Error::Stopped`].
#[must_use = "a pending reply does nothing unless awaited or waited on"]
pub struct PendingReply<T> {
    rx: oneshot::Receiver<Result<Reply>>,
    extract: fn(Reply) -> Result<T>,
}

impl<T> PendingReply<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<Reply>>, extract: fn(Reply) -> Result<T>) -> Self {
        Self { rx, extract }
    }

    /// An already-failed request.
    pub(crate) fn failed(error: Error, extract: fn(Reply) -> Result<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self::new(rx, extract)
    }

    fn finish(&self, outcome: std::result::Result<Result<Reply>, oneshot::error::RecvError>) -> Result<T> {
        outcome.map_err(|_| Error::Stopped)?.and_then(self.extract)
    }

    /// Block the current thread until the request completes.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn wait(self) -> Result<T> {
        let extract = self.extract;
        self.rx
            .blocking_recv()
            .map_err(|_| Error::Stopped)?
            .and_then(extract)
    }

    /// Take the result if the request has completed.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result.and_then(self.extract)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(Error::Stopped)),
        }
    }
}

impl<T> Future for PendingReply<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => return Poll::Pending,
        };
        Poll::Ready(self.finish(outcome))
    }
}

impl<T> std::fmt::Debug for PendingReply<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply").finish_non_exhaustive()
    }
}
