//! Host-side orchestrator.
//!
//! The [`Manager`] lives on the host thread. It numbers requests, keeps the
//! callback for each one, grows the worker pool under load and runs callbacks
//! when results are drained.
//!
//! # Scaling
//!
//! After every submission the manager compares the queued units with the
//! workers free to take them (starting, ready or idle). If the queue is
//! longer and the pool is below `worker_count_max`, one more worker is
//! spawned, so a burst of long-running requests grows the pool right away. The pool never shrinks;
//! workers live until [`Manager::shutdown`].
//!
//! # Draining
//!
//! | Call | Blocks | Use |
//! |------|--------|-----|
//! | [`Manager::drain_due`] | no | every host tick / doorbell ring |
//! | [`Manager::await_all`] | yes | before shutdown |
//!
//! Results may complete in any order; each one is delivered exactly once to
//! the callbacks of its own request.

mod callbacks;

use std::backtrace::Backtrace;
use std::cell::Cell;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::Location;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::config::StoreConfig;
use crate::core::{Error, Result};
use crate::handler::{Dispatcher, HandlerRegistry, Query};
use crate::notify::WakeNotifier;
use crate::pool::{PoolStats, Worker, WorkerContext};
use crate::queue::{RecvQueue, SendQueue};
use crate::store::{Backend, Connection};
use crate::types::{Failure, Outcome, QueryResult, RequestId, Response};

pub use callbacks::{CallbackResult, Callbacks};
use callbacks::{CallbackTable, Origin, PendingCallback};

/// Thread name prefix for workers.
const WORKER_NAME_PREFIX: &str = "store-worker";

/// Poll interval while waiting for the first worker to connect.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How often `await_all` re-checks that some worker is still alive.
const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Orchestrates a pool of store workers from the host thread.
pub struct Manager<B: Backend> {
    ctx: WorkerContext<B>,
    config: StoreConfig,
    /// Host-thread connection for `submit_and_await`. `None` after shutdown.
    direct: Option<B::Connection>,
    direct_dispatcher: Dispatcher<B::Connection>,
    /// Append-only; index == worker id.
    workers: Vec<Worker>,
    callbacks: CallbackTable,
    /// Drained but not yet dispatched results.
    backlog: VecDeque<QueryResult>,
    next_id: AtomicU64,
    submitted: u64,
    completed: u64,
    failed: u64,
    closed: bool,
}

impl<B: Backend> Manager<B> {
    /// Create a manager with an empty pool.
    ///
    /// Opens the host-thread connection. Workers are spawned on demand by
    /// [`submit`](Self::submit).
    pub fn new(
        backend: B,
        registry: HandlerRegistry<B::Connection>,
        config: StoreConfig,
        notifier: Arc<dyn WakeNotifier>,
    ) -> Result<Self> {
        let direct = backend.connect().map_err(|e| Error::Connect { message: e.message })?;
        let registry = Arc::new(registry);

        let ctx = WorkerContext {
            backend: Arc::new(backend),
            registry: Arc::clone(&registry),
            send: Arc::new(SendQueue::new()),
            recv: Arc::new(RecvQueue::new()),
            notifier,
        };

        tracing::info!(
            backend = ctx.backend.name(),
            max_workers = config.worker_count_max(),
            handlers = registry.len(),
            "store manager created"
        );

        Ok(Self {
            ctx,
            direct: Some(direct),
            direct_dispatcher: Dispatcher::new(registry),
            workers: Vec::with_capacity(config.worker_count_max()),
            config,
            callbacks: CallbackTable::default(),
            backlog: VecDeque::new(),
            next_id: AtomicU64::new(1),
            submitted: 0,
            completed: 0,
            failed: 0,
            closed: false,
        })
    }

    /// Create a manager, start the first worker and wait until it has connected.
    ///
    /// A worker that cannot reach the store surfaces as [`Error::Connect`].
    pub fn connect(
        backend: B,
        registry: HandlerRegistry<B::Connection>,
        config: StoreConfig,
        notifier: Arc<dyn WakeNotifier>,
    ) -> Result<Self> {
        let mut manager = Self::new(backend, registry, config, notifier)?;
        manager.spawn_worker()?;
        manager.wait_ready()?;
        Ok(manager)
    }

    fn wait_ready(&self) -> Result<()> {
        let Some(first) = self.workers.first() else {
            return Err(Error::Connect {
                message: "no worker started".into(),
            });
        };

        let started = Instant::now();
        while !first.connection_established() {
            if let Some(timeout) = self.config.ready_timeout {
                if started.elapsed() >= timeout {
                    return Err(Error::Connect {
                        message: format!(
                            "worker did not report a connection within {}ms",
                            timeout.as_millis()
                        ),
                    });
                }
            }
            thread::sleep(READY_POLL_INTERVAL);
        }

        match first.connection_error() {
            Some(message) => Err(Error::Connect {
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn spawn_worker(&mut self) -> Result<()> {
        let id = self.workers.len();
        let worker = Worker::spawn(id, WORKER_NAME_PREFIX, self.ctx.clone())?;
        self.workers.push(worker);

        tracing::debug!(
            workers = self.workers.len(),
            max = self.config.worker_count_max(),
            "pool grew"
        );
        Ok(())
    }

    /// Grow the pool by one worker when queued units outnumber the workers
    /// free to take them.
    fn scale(&mut self) {
        let available = self.workers.iter().filter(|w| w.is_available()).count();
        if self.ctx.send.pending_count() <= available {
            return;
        }
        if self.workers.len() >= self.config.worker_count_max() {
            return;
        }
        if let Err(e) = self.spawn_worker() {
            tracing::warn!(error = %e, workers = self.workers.len(), "could not grow pool");
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Queue a request for the worker pool. Never blocks.
    ///
    /// The callbacks run later on this thread, from [`drain_due`](Self::drain_due)
    /// or [`await_all`](Self::await_all). Fails with [`Error::QueueShutdown`]
    /// after [`shutdown`](Self::shutdown).
    #[track_caller]
    pub fn submit(&mut self, query: Query<B::Connection>, callbacks: Callbacks) -> Result<RequestId> {
        if self.closed || self.ctx.send.is_invalidated() {
            return Err(Error::QueueShutdown);
        }

        let origin = Origin {
            location: Location::caller(),
            trace: self.config.capture_trace.then(Backtrace::force_capture),
        };
        let id = RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.callbacks.insert(id, PendingCallback { callbacks, origin });
        if let Err(e) = self.ctx.send.schedule(query.into_unit(id)) {
            self.callbacks.remove(id);
            return Err(e.into());
        }
        self.submitted += 1;

        self.scale();
        Ok(id)
    }

    /// Queue a request and get a future for its outcome.
    ///
    /// The future resolves once the result is drained by
    /// [`drain_due`](Self::drain_due) or [`await_all`](Self::await_all).
    #[track_caller]
    pub fn request(
        &mut self,
        query: Query<B::Connection>,
    ) -> Result<impl Future<Output = Outcome> + 'static> {
        let (tx, rx) = oneshot::channel::<Outcome>();
        let on_success_slot = Rc::new(Cell::new(Some(tx)));
        let on_error_slot = Rc::clone(&on_success_slot);

        let callbacks = Callbacks::none()
            .on_success(move |response| {
                if let Some(tx) = on_success_slot.take() {
                    let _ = tx.send(Ok(response));
                }
                Ok(())
            })
            .on_error(move |failure| {
                if let Some(tx) = on_error_slot.take() {
                    let _ = tx.send(Err(failure.clone()));
                }
                Ok(())
            });

        self.submit(query, callbacks)?;

        Ok(async move {
            rx.await.unwrap_or_else(|_| {
                Err(Failure::response(
                    "manager dropped before the request completed",
                ))
            })
        })
    }

    /// Run a request right here on the host connection, bypassing the pool.
    pub fn submit_and_await(&mut self, query: Query<B::Connection>) -> Result<Response> {
        let conn = self.direct.as_mut().ok_or(Error::QueueShutdown)?;
        self.direct_dispatcher
            .run(conn, &query.handler, &query.args)
            .map_err(Error::Failure)
    }

    // =========================================================================
    // Draining
    // =========================================================================

    /// Dispatch every result available right now. Never blocks.
    ///
    /// Returns the number of callbacks run. A failing success callback
    /// aborts the drain with [`Error::Callback`]; results not yet dispatched
    /// stay queued for the next call.
    pub fn drain_due(&mut self) -> Result<usize> {
        self.backlog.extend(self.ctx.recv.drain_all());
        self.dispatch_backlog()
    }

    /// Block until every pending request has been dispatched.
    pub fn await_all(&mut self) -> Result<()> {
        loop {
            self.dispatch_backlog()?;

            let pending = self.callbacks.len();
            if pending == 0 {
                return Ok(());
            }

            let results = self.ctx.recv.await_at_least_for(pending, LIVENESS_CHECK_INTERVAL);
            if results.is_empty()
                && self.ctx.recv.is_empty()
                && !self.workers.iter().any(Worker::is_alive)
            {
                return Err(Error::NoLiveWorkers { pending });
            }
            self.backlog.extend(results);
        }
    }

    fn dispatch_backlog(&mut self) -> Result<usize> {
        let mut dispatched = 0;
        while let Some(result) = self.backlog.pop_front() {
            self.dispatch(result)?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn dispatch(&mut self, result: QueryResult) -> Result<()> {
        let QueryResult { id, outcome } = result;

        let Some(PendingCallback { callbacks, origin }) = self.callbacks.remove(id) else {
            tracing::error!(request_id = id.get(), "result without a pending callback");
            return Err(Error::MissingCallback { id });
        };

        match outcome {
            Ok(response) => {
                self.completed += 1;
                if let Some(on_success) = callbacks.on_success {
                    on_success(response).map_err(|source| Error::Callback {
                        id,
                        location: origin.location,
                        trace: origin.rendered_trace(),
                        source,
                    })?;
                }
            }
            Err(failure) => {
                self.failed += 1;
                let callback_error = match callbacks.on_error {
                    Some(on_error) => match on_error(&failure) {
                        Ok(()) => return Ok(()),
                        Err(e) => Some(e),
                    },
                    None => None,
                };
                report_unhandled(id, &failure, &origin, callback_error.as_deref());
            }
        }
        Ok(())
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stop the pool: invalidate the queue, let workers finish what is
    /// queued, join them and close the host connection.
    ///
    /// Call [`await_all`](Self::await_all) first if no callback may be skipped.
    /// Results produced during shutdown can still be drained afterwards.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        tracing::info!(workers = self.workers.len(), "shutting down store manager");

        self.ctx.send.invalidate();
        for worker in &mut self.workers {
            worker.join();
        }

        if let Some(mut conn) = self.direct.take() {
            if let Err(e) = conn.close() {
                tracing::warn!(error = %e, "error closing host connection");
            }
        }

        if !self.callbacks.is_empty() {
            tracing::warn!(
                pending = self.callbacks.len(),
                "shut down with undrained requests"
            );
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// True once the first worker finished its connect attempt.
    pub fn connection_established(&self) -> bool {
        self.workers
            .first()
            .is_some_and(Worker::connection_established)
    }

    /// Connect error reported by the first worker, if any.
    pub fn connection_error(&self) -> Option<&str> {
        self.workers.first().and_then(Worker::connection_error)
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn busy_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_busy()).count()
    }

    pub fn live_worker_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Requests submitted but not yet dispatched.
    pub fn pending_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Units waiting for a worker.
    pub fn queued_count(&self) -> usize {
        self.ctx.send.pending_count()
    }

    /// Queued units per live worker.
    pub fn load(&self) -> f64 {
        self.stats().load(self.live_worker_count())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers.len(),
            busy: self.busy_count(),
            queued: self.queued_count(),
            pending: self.callbacks.len(),
            submitted: self.submitted,
            completed: self.completed,
            failed: self.failed,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<B: Backend> Drop for Manager<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Terminal reporting point for failures nobody handled.
fn report_unhandled(
    id: RequestId,
    failure: &Failure,
    origin: &Origin,
    callback_error: Option<&(dyn std::error::Error + Send + Sync)>,
) {
    let request_id = id.get();

    tracing::error!(
        request_id,
        stage = %failure.stage(),
        "unhandled request failure: {}",
        failure.message()
    );
    if let Some(e) = callback_error {
        tracing::error!(request_id, error = %e, "error callback failed");
    }
    if let Some(args) = failure.args() {
        tracing::debug!(request_id, "args: {}", args);
    }
    tracing::debug!(request_id, "submitted at {}", origin.location);
    if let Some(trace) = &origin.trace {
        tracing::debug!(request_id, "stack trace:\n{}", trace);
    }
}
