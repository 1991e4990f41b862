//! Result queue from the workers back to the host.

use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::types::QueryResult;

/// FIFO of [`QueryResult`]s. Every published result is handed out exactly once.
pub struct RecvQueue {
    tx: Sender<QueryResult>,
    rx: Receiver<QueryResult>,
}

impl RecvQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Publish a result. Never blocks.
    pub fn publish(&self, result: QueryResult) {
        // The receiver lives as long as the queue, so the channel is never disconnected
        let _ = self.tx.send(result);
    }

    /// Take everything currently queued without waiting.
    pub fn drain_all(&self) -> Vec<QueryResult> {
        self.rx.try_iter().collect()
    }

    /// Block until `n` results are available and take exactly `n` of them.
    ///
    /// Results beyond `n` stay queued for the next call.
    pub fn await_at_least(&self, n: usize) -> Vec<QueryResult> {
        let mut results = Vec::with_capacity(n);
        while results.len() < n {
            match self.rx.recv() {
                Ok(result) => results.push(result),
                Err(_) => break,
            }
        }
        results
    }

    /// Like [`await_at_least`](Self::await_at_least), but gives up after
    /// `timeout` and returns whatever arrived so far.
    pub fn await_at_least_for(&self, n: usize, timeout: Duration) -> Vec<QueryResult> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::with_capacity(n);
        while results.len() < n {
            match self.rx.recv_deadline(deadline) {
                Ok(result) => results.push(result),
                Err(_) => break,
            }
        }
        results
    }

    /// Results waiting to be drained.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for RecvQueue {
    fn default() -> Self {
        Self::new()
    }
}
