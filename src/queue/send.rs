//! Work queue from the host to the workers.

use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::handler::WorkUnit;
use crate::pool::{PoolError, PoolResult};

/// FIFO of [`WorkUnit`]s with a one-way shutdown switch.
///
/// No unit is lost or delivered twice, and after [`invalidate`](Self::invalidate)
/// takers receive whatever is still queued followed by `None`.
pub struct SendQueue<C> {
    /// `None` once invalidated.
    tx: Mutex<Option<Sender<WorkUnit<C>>>>,
    rx: Receiver<WorkUnit<C>>,
}

impl<C> SendQueue<C> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<Sender<WorkUnit<C>>>> {
        // An Option swap cannot leave the slot half-written
        self.tx.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a unit for the next free worker.
    ///
    /// Returns [`PoolError::Shutdown`] once the queue has been invalidated.
    pub fn schedule(&self, unit: WorkUnit<C>) -> PoolResult<()> {
        match self.sender().as_ref() {
            Some(tx) => tx.send(unit).map_err(|_| PoolError::Shutdown),
            None => Err(PoolError::Shutdown),
        }
    }

    /// Block until a unit is available. `None` means invalidated and empty.
    pub fn take(&self) -> Option<WorkUnit<C>> {
        self.rx.recv().ok()
    }

    /// Stop accepting work and wake every blocked taker. Idempotent.
    pub fn invalidate(&self) {
        self.sender().take();
    }

    pub fn is_invalidated(&self) -> bool {
        self.sender().is_none()
    }

    /// Units waiting for a worker. A racy snapshot, only good as a load hint.
    pub fn pending_count(&self) -> usize {
        self.rx.len()
    }
}

impl<C> Default for SendQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}
