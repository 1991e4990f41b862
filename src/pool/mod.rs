//! Worker pool infrastructure.
//!
//! Workers are plain OS threads, each owning one backing-store connection.
//! The pool itself (the ordered worker list and the growth decision) is held
//! by the [`Manager`](crate::Manager) on the host thread.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Manager (host thread)                 │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐    ┌─────────┐    ┌─────────┐                 │
//! │  │ Worker0 │    │ Worker1 │    │ Worker2 │  ... ≤ max      │
//! │  │  conn   │    │  conn   │    │  conn   │                 │
//! │  └────┬────┘    └────┬────┘    └────┬────┘                 │
//! │       │ take         │              │        publish       │
//! │       └──────────────┴──────────────┴──────▶ RecvQueue     │
//! │                      │                           │         │
//! │              ┌───────▼───────┐           ┌───────▼───────┐ │
//! │              │   SendQueue   │           │  drain_due()  │ │
//! │              └───────▲───────┘           └───────────────┘ │
//! │                      │ submit()                            │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod worker;

pub use error::{PoolError, PoolResult};
pub(crate) use worker::WorkerContext;
pub use worker::{Worker, WorkerState};

/// Snapshot of pool and request counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// Workers spawned so far (the pool never shrinks).
    pub workers: usize,
    /// Workers currently executing a request.
    pub busy: usize,
    /// Units waiting in the send queue.
    pub queued: usize,
    /// Requests submitted but not yet drained.
    pub pending: usize,
    /// Requests submitted through the worker pool.
    pub submitted: u64,
    /// Drained results that succeeded.
    pub completed: u64,
    /// Drained results that failed.
    pub failed: u64,
}

impl PoolStats {
    /// Queued units per live worker.
    pub fn load(&self, live_workers: usize) -> f64 {
        if live_workers == 0 {
            return if self.queued == 0 { 0.0 } else { f64::INFINITY };
        }
        self.queued as f64 / live_workers as f64
    }
}
