//! Batched get pipeline
//!
//! A worker thread takes the handler, fetches the keys one at a time in
//! request order, and streams the results through a single channel. The
//! stream ends when the channel closes; at most one error is sent and it
//! is always the last event.
//!
//! Dropping the stream does not stop the worker. It keeps issuing the
//! remaining reads so the connection stays framed, then drops the handler.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{MemlinkError, Result};
use crate::network::Transport;

use super::request::{BatchResponse, GetRequest};
use super::Handler;

/// One event of a batched get
#[derive(Debug)]
pub enum BatchEvent<R> {
    /// A hit or a miss for the next key in request order
    Item(R),
    /// Terminal failure; nothing follows it
    Failed(MemlinkError),
}

/// Streaming result of a batched get.
///
/// Iterate to receive one `Ok` per key until the batch completes, or
/// `Err` once if it fails. A stream that ends without an `Err` completed
/// every key.
pub struct BatchGet<R, T: Transport> {
    events: Receiver<BatchEvent<R>>,
    worker: JoinHandle<Handler<T>>,
    done: bool,
}

impl<R, T: Transport> BatchGet<R, T> {
    /// Wait for the worker and take the handler back.
    ///
    /// Undelivered results are dropped; the worker still reads every
    /// remaining response first. A batch that ended in a fatal error hands
    /// back a handler whose connection must be closed.
    pub fn finish(self) -> Result<Handler<T>> {
        let BatchGet { events, worker, .. } = self;
        drop(events);
        worker.join().map_err(|_| MemlinkError::WorkerPanicked)
    }
}

impl<R, T: Transport> Iterator for BatchGet<R, T> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Result<R>> {
        if self.done {
            return None;
        }
        match self.events.recv() {
            Ok(BatchEvent::Item(response)) => Some(Ok(response)),
            Ok(BatchEvent::Failed(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// Move the handler into a worker running `cmd`
pub(super) fn spawn<R, T>(handler: Handler<T>, cmd: GetRequest) -> BatchGet<R, T>
where
    R: BatchResponse,
    T: Transport,
{
    let (tx, rx) = channel::bounded(handler.batch_buffer);

    tracing::debug!("Batch of {} keys to {}", cmd.len(), handler.peer);
    let worker = thread::spawn(move || run(handler, cmd, tx));

    BatchGet {
        events: rx,
        worker,
        done: false,
    }
}

fn run<R, T>(mut handler: Handler<T>, cmd: GetRequest, tx: Sender<BatchEvent<R>>) -> Handler<T>
where
    R: BatchResponse,
    T: Transport,
{
    for (idx, (key, quiet, opaque)) in cmd.entries().enumerate() {
        match handler.fetch_for::<R>(key, quiet, opaque) {
            Ok(response) => {
                // A gone consumer does not stop the batch.
                let _ = tx.send(BatchEvent::Item(response));
            }
            Err(e) => {
                tracing::debug!(
                    "Batch to {} failed at key {} of {}: {}",
                    handler.peer,
                    idx + 1,
                    cmd.len(),
                    e
                );
                let _ = tx.send(BatchEvent::Failed(e));
                return handler;
            }
        }
    }

    tracing::debug!("Batch of {} keys to {} complete", cmd.len(), handler.peer);
    handler
}
