//! Worker threads.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use super::error::{PoolError, PoolResult};
use crate::handler::{Dispatcher, HandlerRegistry, WorkUnit};
use crate::notify::WakeNotifier;
use crate::queue::{RecvQueue, SendQueue};
use crate::store::{Backend, Connection};
use crate::types::QueryResult;

/// Lifecycle of a worker.
///
/// `Starting → Ready → (Idle ⇄ Busy)* → Draining → Terminated`, or
/// `Starting → Terminated` when the connection cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Ready = 1,
    Idle = 2,
    Busy = 3,
    Draining = 4,
    Terminated = 5,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WorkerState::Starting,
            1 => WorkerState::Ready,
            2 => WorkerState::Idle,
            3 => WorkerState::Busy,
            4 => WorkerState::Draining,
            _ => WorkerState::Terminated,
        }
    }

    /// Spare capacity for the scaling policy.
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            WorkerState::Starting | WorkerState::Ready | WorkerState::Idle
        )
    }

    pub fn is_alive(&self) -> bool {
        *self != WorkerState::Terminated
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Starting => "starting",
            WorkerState::Ready => "ready",
            WorkerState::Idle => "idle",
            WorkerState::Busy => "busy",
            WorkerState::Draining => "draining",
            WorkerState::Terminated => "terminated",
        }
    }
}

/// State the worker thread publishes for the host to poll.
struct WorkerStatus {
    state: AtomicU8,
    /// Set once the connect attempt finished, successfully or not.
    conn_reported: AtomicBool,
    conn_error: OnceLock<String>,
    processed: AtomicU64,
}

impl WorkerStatus {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Starting as u8),
            conn_reported: AtomicBool::new(false),
            conn_error: OnceLock::new(),
            processed: AtomicU64::new(0),
        }
    }

    #[inline]
    fn set(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Everything a worker thread needs, moved into it at spawn.
pub(crate) struct WorkerContext<B: Backend> {
    pub backend: Arc<B>,
    pub registry: Arc<HandlerRegistry<B::Connection>>,
    pub send: Arc<SendQueue<B::Connection>>,
    pub recv: Arc<RecvQueue>,
    pub notifier: Arc<dyn WakeNotifier>,
}

impl<B: Backend> Clone for WorkerContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            send: Arc::clone(&self.send),
            recv: Arc::clone(&self.recv),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

/// Handle to a worker thread owning one backing-store connection.
pub struct Worker {
    id: usize,
    status: Arc<WorkerStatus>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start a worker thread. Connection setup happens on the new thread.
    pub(crate) fn spawn<B: Backend>(id: usize, name_prefix: &str, ctx: WorkerContext<B>) -> PoolResult<Self> {
        let status = Arc::new(WorkerStatus::new());
        let thread_status = Arc::clone(&status);

        let handle = thread::Builder::new()
            .name(format!("{}-{}", name_prefix, id))
            .spawn(move || worker_main_loop(id, ctx, &thread_status))
            .map_err(|e| PoolError::Spawn(format!("worker {}: {}", id, e)))?;

        tracing::debug!(worker = id, "worker spawned");

        Ok(Self {
            id,
            status,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.status.get()
    }

    pub fn is_busy(&self) -> bool {
        self.state() == WorkerState::Busy
    }

    pub fn is_available(&self) -> bool {
        self.state().is_available()
    }

    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    /// True once the connect attempt has finished (check [`connection_error`](Self::connection_error)).
    pub fn connection_established(&self) -> bool {
        self.status.conn_reported.load(Ordering::Acquire)
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.status.conn_error.get().map(String::as_str)
    }

    /// Requests this worker has answered.
    pub fn processed(&self) -> u64 {
        self.status.processed.load(Ordering::Relaxed)
    }

    /// Wait for the thread to exit. The send queue must be invalidated first.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(worker = self.id, "worker thread panicked");
                self.status.set(WorkerState::Terminated);
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("processed", &self.processed())
            .finish_non_exhaustive()
    }
}

/// Worker thread main loop.
fn worker_main_loop<B: Backend>(id: usize, ctx: WorkerContext<B>, status: &WorkerStatus) {
    let mut conn = match ctx.backend.connect() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(
                worker = id,
                backend = ctx.backend.name(),
                error = %e,
                "worker could not connect"
            );
            let _ = status.conn_error.set(e.message);
            status.set(WorkerState::Terminated);
            status.conn_reported.store(true, Ordering::Release);
            return;
        }
    };

    status.set(WorkerState::Ready);
    status.conn_reported.store(true, Ordering::Release);
    tracing::debug!(worker = id, backend = ctx.backend.name(), "worker connected");

    let mut dispatcher = Dispatcher::new(Arc::clone(&ctx.registry));

    while let Some(WorkUnit { id: request_id, handler, args }) = ctx.send.take() {
        status.set(WorkerState::Busy);

        let outcome = dispatcher.run(&mut conn, &handler, &args);
        if let Err(failure) = &outcome {
            tracing::debug!(
                worker = id,
                request_id = request_id.get(),
                handler = handler.label(),
                stage = %failure.stage(),
                "request failed: {}",
                failure.message()
            );
        }

        ctx.recv.publish(QueryResult::new(request_id, outcome));
        ctx.notifier.wake();
        status.processed.fetch_add(1, Ordering::Relaxed);
        status.set(WorkerState::Idle);
    }

    status.set(WorkerState::Draining);
    if let Err(e) = conn.close() {
        tracing::warn!(worker = id, error = %e, "error closing connection");
    }
    status.set(WorkerState::Terminated);

    tracing::debug!(
        worker = id,
        processed = status.processed.load(Ordering::Relaxed),
        "worker stopped"
    );
}
